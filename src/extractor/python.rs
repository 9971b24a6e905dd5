//! Python element extractor (indent family)
//!
//! Kinds covered: class, function/method, static properties (class-level
//! assignments), imports, decorators. Getter/setter classification happens
//! in the post-processor once decorators are attached.

use tracing::debug;
use tree_sitter::{Node, Tree};

use crate::error::Result;
use crate::extractor::{clean_annotation, RawElement, RawParameter};
use crate::navigator::{execute_query, find_first_ancestor, get_node_range, get_node_text};
use crate::schema::ElementKind;

const CLASS_QUERY: &str = "(class_definition name: (identifier) @name) @definition";
const FUNCTION_QUERY: &str = "(function_definition name: (identifier) @name) @definition";
const IMPORT_QUERY: &str = "[(import_statement) (import_from_statement)] @definition";
const DECORATOR_QUERY: &str = "(decorator) @definition";
const CLASS_ATTR_QUERY: &str = "(class_definition body: (block (expression_statement (assignment left: (identifier) @name) @definition)))";

/// Extract all raw element records from a Python source tree
pub fn extract(tree: &Tree, source: &str) -> Result<Vec<RawElement>> {
    let mut records = Vec::new();

    for m in execute_query(tree, source, CLASS_QUERY)? {
        let (Some(node), Some(name)) = (m.get("definition"), m.get("name")) else {
            debug!("class match missing captures, skipping");
            continue;
        };
        let mut record = RawElement::from_node(
            ElementKind::Class,
            get_node_text(name, source),
            node,
            source,
        );
        record.parent_name = enclosing_class_name(node, source);
        record.body_range = node.child_by_field_name("body").map(|b| get_node_range(&b));
        records.push(record);
    }

    for m in execute_query(tree, source, FUNCTION_QUERY)? {
        let (Some(node), Some(name)) = (m.get("definition"), m.get("name")) else {
            debug!("function match missing captures, skipping");
            continue;
        };
        if let Some(record) = build_callable(node, name, source) {
            records.push(record);
        }
    }

    for m in execute_query(tree, source, CLASS_ATTR_QUERY)? {
        let (Some(node), Some(name)) = (m.get("definition"), m.get("name")) else {
            continue;
        };
        let mut record = RawElement::from_node(
            ElementKind::StaticProperty,
            get_node_text(name, source),
            node,
            source,
        );
        record.parent_name = enclosing_class_name(node, source);
        record.value_type = node
            .child_by_field_name("type")
            .map(|t| get_node_text(&t, source));
        record.value_range = node
            .child_by_field_name("right")
            .map(|v| get_node_range(&v));
        records.push(record);
    }

    for m in execute_query(tree, source, IMPORT_QUERY)? {
        let Some(node) = m.get("definition") else {
            continue;
        };
        records.push(RawElement::from_node(ElementKind::Import, "", node, source));
    }

    for m in execute_query(tree, source, DECORATOR_QUERY)? {
        let Some(node) = m.get("definition") else {
            continue;
        };
        let text = get_node_text(node, source);
        let name = decorator_name(&text);
        records.push(RawElement::from_node(
            ElementKind::Decorator,
            name,
            node,
            source,
        ));
    }

    Ok(records)
}

/// Build a function or method record, or `None` for defs nested in callables
fn build_callable(node: &Node, name_node: &Node, source: &str) -> Option<RawElement> {
    let ancestor = find_first_ancestor(node, &["class_definition", "function_definition"]);
    let kind = match &ancestor {
        Some(a) if a.kind() == "class_definition" => ElementKind::Method,
        // Local defs inside another callable are not addressable elements
        Some(_) => return None,
        None => ElementKind::Function,
    };

    let mut record = RawElement::from_node(kind, get_node_text(name_node, source), node, source);
    if let Some(class_node) = ancestor.filter(|a| a.kind() == "class_definition") {
        record.parent_name = class_node
            .child_by_field_name("name")
            .map(|n| get_node_text(&n, source));
    }

    record.body_range = node.child_by_field_name("body").map(|b| get_node_range(&b));
    if let Some(ret) = node.child_by_field_name("return_type") {
        record.return_type = Some(get_node_text(&ret, source));
        record.return_node = Some((get_node_text(&ret, source), get_node_range(&ret)));
    }

    if let Some(params) = node.child_by_field_name("parameters") {
        record.parameters = extract_parameters(&params, source);
    }

    Some(record)
}

/// Parameter sub-records with name, annotation, default, and position
fn extract_parameters(params: &Node, source: &str) -> Vec<RawParameter> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        let index = out.len();
        let content = get_node_text(&child, source);
        let range = get_node_range(&child);
        match child.kind() {
            "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                out.push(RawParameter {
                    name: content.clone(),
                    content,
                    range,
                    value_type: None,
                    default_value: None,
                    index,
                })
            }
            "typed_parameter" => {
                let name = child
                    .named_child(0)
                    .map(|n| get_node_text(&n, source))
                    .unwrap_or_default();
                out.push(RawParameter {
                    name,
                    content,
                    range,
                    value_type: child
                        .child_by_field_name("type")
                        .map(|t| clean_annotation(&get_node_text(&t, source))),
                    default_value: None,
                    index,
                });
            }
            "default_parameter" | "typed_default_parameter" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| get_node_text(&n, source))
                    .unwrap_or_default();
                out.push(RawParameter {
                    name,
                    content,
                    range,
                    value_type: child
                        .child_by_field_name("type")
                        .map(|t| clean_annotation(&get_node_text(&t, source))),
                    default_value: child
                        .child_by_field_name("value")
                        .map(|v| get_node_text(&v, source)),
                    index,
                });
            }
            _ => {}
        }
    }
    out
}

/// Name of the class that lexically encloses `node`, if any
fn enclosing_class_name(node: &Node, source: &str) -> Option<String> {
    find_first_ancestor(node, &["class_definition"])
        .and_then(|c| c.child_by_field_name("name"))
        .map(|n| get_node_text(&n, source))
}

/// `@app.route("/x")` -> `app.route`, `@property` -> `property`
fn decorator_name(text: &str) -> String {
    let stripped = text.trim_start_matches('@');
    let end = stripped.find('(').unwrap_or(stripped.len());
    stripped[..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Lang;
    use crate::parser::ParserFacade;

    fn extract_source(source: &str) -> Vec<RawElement> {
        let tree = ParserFacade::new().parse(Lang::Python, source).unwrap();
        extract(&tree, source).unwrap()
    }

    #[test]
    fn test_method_vs_function() {
        let source = "def top():\n    pass\n\nclass C:\n    def m(self):\n        pass\n";
        let records = extract_source(source);

        let top = records.iter().find(|r| r.name == "top").unwrap();
        assert_eq!(top.kind, ElementKind::Function);
        assert!(top.parent_name.is_none());

        let method = records.iter().find(|r| r.name == "m").unwrap();
        assert_eq!(method.kind, ElementKind::Method);
        assert_eq!(method.parent_name.as_deref(), Some("C"));
    }

    #[test]
    fn test_nested_def_skipped() {
        let source = "def outer():\n    def inner():\n        pass\n    return inner\n";
        let records = extract_source(source);
        assert!(records.iter().any(|r| r.name == "outer"));
        assert!(!records.iter().any(|r| r.name == "inner"));
    }

    #[test]
    fn test_parameters_and_defaults() {
        let source = "def f(a, b: int, c: str = 'x', *args, **kwargs):\n    pass\n";
        let records = extract_source(source);
        let f = records.iter().find(|r| r.name == "f").unwrap();

        let names: Vec<&str> = f.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "*args", "**kwargs"]);
        assert_eq!(f.parameters[1].value_type.as_deref(), Some("int"));
        assert_eq!(f.parameters[2].default_value.as_deref(), Some("'x'"));
        assert_eq!(f.parameters[2].index, 2);
    }

    #[test]
    fn test_content_is_byte_exact() {
        let source = "class C:\n    def f(self):\n        return 1\n";
        let records = extract_source(source);
        for record in &records {
            let (start, end) = record.byte_span;
            assert_eq!(&source[start..end], record.content);
            let (s, e) = record.range.to_byte_span(source).unwrap();
            assert_eq!((s, e), record.byte_span);
        }
    }

    #[test]
    fn test_class_attribute_is_static_property() {
        let source = "class C:\n    count: int = 0\n";
        let records = extract_source(source);
        let attr = records.iter().find(|r| r.name == "count").unwrap();
        assert_eq!(attr.kind, ElementKind::StaticProperty);
        assert_eq!(attr.parent_name.as_deref(), Some("C"));
        assert!(attr.value_range.is_some());
    }

    #[test]
    fn test_imports_and_decorators() {
        let source = "import os\nfrom typing import List\n\n@property\ndef v(self):\n    return 1\n";
        let records = extract_source(source);

        let imports: Vec<_> = records
            .iter()
            .filter(|r| r.kind == ElementKind::Import)
            .collect();
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].content, "import os");

        let decorator = records
            .iter()
            .find(|r| r.kind == ElementKind::Decorator)
            .unwrap();
        assert_eq!(decorator.name, "property");
        assert_eq!(decorator.content, "@property");
    }

    #[test]
    fn test_decorator_name_parsing() {
        assert_eq!(decorator_name("@property"), "property");
        assert_eq!(decorator_name("@value.setter"), "value.setter");
        assert_eq!(decorator_name("@app.route('/x')"), "app.route");
    }
}
