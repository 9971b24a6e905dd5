//! Tree navigation: query execution, node text, and 1-based ranges
//!
//! Tree-sitter reports 0-based coordinates; every public function here
//! normalizes to the crate's 1-based convention. Where a query produces
//! several matches they are returned in source order by start byte, never
//! in capture order.

use std::collections::HashMap;
use tree_sitter::{Node, Query, QueryCursor, StreamingIterator, Tree};

use crate::error::{CodeHemError, Result};
use crate::schema::ElementRange;

/// One query match: capture name to node
pub type QueryMatchMap<'tree> = HashMap<String, Node<'tree>>;

/// Execute a query against a parsed tree.
///
/// Each returned map holds every capture of one match. Matches are sorted by
/// the start byte of their `@definition` capture (falling back to the
/// earliest capture) so callers see source order.
pub fn execute_query<'tree>(
    tree: &'tree Tree,
    source: &str,
    query_source: &str,
) -> Result<Vec<QueryMatchMap<'tree>>> {
    let query = Query::new(&tree.language(), query_source).map_err(|e| CodeHemError::Plugin {
        message: format!("invalid query: {}", e),
    })?;

    let capture_names: Vec<String> = query
        .capture_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());

    let mut results = Vec::new();
    while let Some(m) = matches.next() {
        let mut map = QueryMatchMap::new();
        for capture in m.captures {
            let name = capture_names[capture.index as usize].clone();
            map.insert(name, capture.node);
        }
        if !map.is_empty() {
            results.push(map);
        }
    }

    results.sort_by_key(|map| {
        map.get("definition")
            .map(|n| n.start_byte())
            .unwrap_or_else(|| map.values().map(|n| n.start_byte()).min().unwrap_or(0))
    });

    Ok(results)
}

/// Get the text content of a node
pub fn get_node_text(node: &Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

/// Get the 1-based inclusive line range of a node
pub fn get_node_line_range(node: &Node) -> (usize, usize) {
    (
        node.start_position().row + 1,
        node.end_position().row + 1,
    )
}

/// Get the full 1-based range of a node, with byte columns
pub fn get_node_range(node: &Node) -> ElementRange {
    ElementRange::new(
        node.start_position().row + 1,
        node.start_position().column + 1,
        node.end_position().row + 1,
        node.end_position().column + 1,
    )
}

/// Walk up the parent chain until a node of one of `kinds` is found
pub fn find_first_ancestor<'tree>(node: &Node<'tree>, kinds: &[&str]) -> Option<Node<'tree>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Lang;
    use crate::parser::ParserFacade;

    fn parse_python(source: &str) -> Tree {
        ParserFacade::new().parse(Lang::Python, source).unwrap()
    }

    #[test]
    fn test_execute_query_source_order() {
        let source = "def b():\n    pass\n\ndef a():\n    pass\n";
        let tree = parse_python(source);
        let matches = execute_query(
            &tree,
            source,
            "(function_definition name: (identifier) @name) @definition",
        )
        .unwrap();

        assert_eq!(matches.len(), 2);
        // Declaration order, not alphabetical
        assert_eq!(get_node_text(&matches[0]["name"], source), "b");
        assert_eq!(get_node_text(&matches[1]["name"], source), "a");
    }

    #[test]
    fn test_invalid_query_is_plugin_error() {
        let source = "x = 1\n";
        let tree = parse_python(source);
        let err = execute_query(&tree, source, "(nonexistent_node) @x").unwrap_err();
        assert_eq!(err.kind(), "PluginError");
    }

    #[test]
    fn test_node_range_is_one_based() {
        let source = "def f():\n    return 1\n";
        let tree = parse_python(source);
        let matches = execute_query(
            &tree,
            source,
            "(function_definition name: (identifier) @name) @definition",
        )
        .unwrap();

        let range = get_node_range(&matches[0]["definition"]);
        assert_eq!(range.start_line, 1);
        assert_eq!(range.start_col, 1);
        assert_eq!(range.end_line, 2);

        let (start, end) = get_node_line_range(&matches[0]["definition"]);
        assert_eq!((start, end), (1, 2));
    }

    #[test]
    fn test_find_first_ancestor() {
        let source = "class C:\n    def f(self):\n        return 1\n";
        let tree = parse_python(source);
        let matches = execute_query(
            &tree,
            source,
            "(function_definition name: (identifier) @name) @definition",
        )
        .unwrap();

        let method = matches[0]["definition"];
        let class = find_first_ancestor(&method, &["class_definition"]).unwrap();
        assert_eq!(class.kind(), "class_definition");

        assert!(find_first_ancestor(&class, &["class_definition"]).is_none());
    }
}
