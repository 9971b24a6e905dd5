//! TypeScript/TSX element extractor (brace family)
//!
//! Kinds covered: class, interface, method (incl. accessors), property and
//! static property fields, function, import, type_alias, enum, namespace,
//! decorator.

use tracing::debug;
use tree_sitter::{Node, Tree};

use crate::error::Result;
use crate::extractor::{clean_annotation, RawElement, RawParameter};
use crate::navigator::{execute_query, find_first_ancestor, get_node_range, get_node_text};
use crate::schema::ElementKind;

const CLASS_QUERY: &str =
    "[(class_declaration name: (type_identifier) @name) (abstract_class_declaration name: (type_identifier) @name)] @definition";
const INTERFACE_QUERY: &str =
    "(interface_declaration name: (type_identifier) @name) @definition";
const METHOD_QUERY: &str =
    "(method_definition name: (property_identifier) @name) @definition";
const FIELD_QUERY: &str =
    "(public_field_definition name: (property_identifier) @name) @definition";
const FUNCTION_QUERY: &str = "(function_declaration name: (identifier) @name) @definition";
const IMPORT_QUERY: &str = "(import_statement) @definition";
const TYPE_ALIAS_QUERY: &str = "(type_alias_declaration name: (type_identifier) @name) @definition";
const ENUM_QUERY: &str = "(enum_declaration name: (identifier) @name) @definition";
const NAMESPACE_QUERY: &str = "(internal_module name: (identifier) @name) @definition";
const DECORATOR_QUERY: &str = "(decorator) @definition";

/// Extract all raw element records from a TypeScript source tree
pub fn extract(tree: &Tree, source: &str) -> Result<Vec<RawElement>> {
    let mut records = Vec::new();

    for (query, kind) in [
        (CLASS_QUERY, ElementKind::Class),
        (INTERFACE_QUERY, ElementKind::Interface),
        (TYPE_ALIAS_QUERY, ElementKind::TypeAlias),
        (ENUM_QUERY, ElementKind::Enum),
        (NAMESPACE_QUERY, ElementKind::Namespace),
    ] {
        for m in execute_query(tree, source, query)? {
            let (Some(node), Some(name)) = (m.get("definition"), m.get("name")) else {
                debug!("{} match missing captures, skipping", kind);
                continue;
            };
            let mut record =
                RawElement::from_node(kind, get_node_text(name, source), node, source);
            strip_leading_decorators(&mut record, node, source);
            record.parent_name = enclosing_container_name(node, source);
            if kind == ElementKind::Enum {
                record.additional.insert(
                    "members".to_string(),
                    serde_json::Value::Array(
                        enum_members(node, source)
                            .into_iter()
                            .map(serde_json::Value::String)
                            .collect(),
                    ),
                );
            }
            records.push(record);
        }
    }

    for m in execute_query(tree, source, METHOD_QUERY)? {
        let (Some(node), Some(name)) = (m.get("definition"), m.get("name")) else {
            debug!("method match missing captures, skipping");
            continue;
        };
        records.push(build_method(node, name, source));
    }

    for m in execute_query(tree, source, FUNCTION_QUERY)? {
        let (Some(node), Some(name)) = (m.get("definition"), m.get("name")) else {
            continue;
        };
        if let Some(record) = build_function(node, name, source) {
            records.push(record);
        }
    }

    for m in execute_query(tree, source, FIELD_QUERY)? {
        let (Some(node), Some(name)) = (m.get("definition"), m.get("name")) else {
            continue;
        };
        records.push(build_field(node, name, source));
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
        records.push(RawElement::from_node(
            ElementKind::Decorator,
            decorator_name(&text),
            node,
            source,
        ));
    }

    Ok(records)
}

/// Class methods, including `get`/`set` accessors
fn build_method(node: &Node, name_node: &Node, source: &str) -> RawElement {
    let kind = match accessor_keyword(node) {
        Some("get") => ElementKind::PropertyGetter,
        Some("set") => ElementKind::PropertySetter,
        _ => ElementKind::Method,
    };

    let mut record = RawElement::from_node(kind, get_node_text(name_node, source), node, source);
    strip_leading_decorators(&mut record, node, source);
    record.parent_name = enclosing_container_name(node, source);
    record.body_range = node
        .child_by_field_name("body")
        .and_then(|b| inner_block_range(&b));
    if let Some(ret) = node.child_by_field_name("return_type") {
        record.return_type = Some(clean_annotation(&get_node_text(&ret, source)));
        record.return_node = Some((get_node_text(&ret, source), get_node_range(&ret)));
    }
    if let Some(params) = node.child_by_field_name("parameters") {
        record.parameters = extract_parameters(&params, source);
    }
    record
}

/// Top-level and namespace-level functions; local functions are skipped
fn build_function(node: &Node, name_node: &Node, source: &str) -> Option<RawElement> {
    if find_first_ancestor(node, &["function_declaration", "method_definition", "arrow_function"])
        .is_some()
    {
        return None;
    }

    let mut record = RawElement::from_node(
        ElementKind::Function,
        get_node_text(name_node, source),
        node,
        source,
    );
    record.parent_name = enclosing_container_name(node, source);
    record.body_range = node
        .child_by_field_name("body")
        .and_then(|b| inner_block_range(&b));
    if let Some(ret) = node.child_by_field_name("return_type") {
        record.return_type = Some(clean_annotation(&get_node_text(&ret, source)));
        record.return_node = Some((get_node_text(&ret, source), get_node_range(&ret)));
    }
    if let Some(params) = node.child_by_field_name("parameters") {
        record.parameters = extract_parameters(&params, source);
    }
    Some(record)
}

/// Class fields; `static` fields get their own kind
fn build_field(node: &Node, name_node: &Node, source: &str) -> RawElement {
    let kind = if has_child_token(node, "static") {
        ElementKind::StaticProperty
    } else {
        ElementKind::Property
    };

    let mut record = RawElement::from_node(kind, get_node_text(name_node, source), node, source);
    strip_leading_decorators(&mut record, node, source);
    record.parent_name = enclosing_container_name(node, source);
    record.value_type = node
        .child_by_field_name("type")
        .map(|t| clean_annotation(&get_node_text(&t, source)));
    record.value_range = node
        .child_by_field_name("value")
        .map(|v| get_node_range(&v));
    record
}

fn extract_parameters(params: &Node, source: &str) -> Vec<RawParameter> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        if !matches!(child.kind(), "required_parameter" | "optional_parameter") {
            continue;
        }
        let index = out.len();
        let name = child
            .child_by_field_name("pattern")
            .map(|p| get_node_text(&p, source))
            .unwrap_or_default();
        out.push(RawParameter {
            name,
            content: get_node_text(&child, source),
            range: get_node_range(&child),
            value_type: child
                .child_by_field_name("type")
                .map(|t| clean_annotation(&get_node_text(&t, source))),
            default_value: child
                .child_by_field_name("value")
                .map(|v| get_node_text(&v, source)),
            index,
        });
    }
    out
}

/// The grammar parses member decorators as leading children of the decorated
/// declaration; the element range must start at the declaration proper.
fn strip_leading_decorators(record: &mut RawElement, node: &Node, source: &str) {
    let mut cursor = node.walk();
    let first_proper = node
        .children(&mut cursor)
        .find(|c| c.kind() != "decorator" && c.kind() != "comment");
    if let Some(first) = first_proper {
        if first.start_byte() > node.start_byte() {
            record.byte_span = (first.start_byte(), node.end_byte());
            record.range = crate::schema::ElementRange::new(
                first.start_position().row + 1,
                first.start_position().column + 1,
                record.range.end_line,
                record.range.end_col,
            );
            record.content = source[first.start_byte()..node.end_byte()].to_string();
        }
    }
}

/// The range strictly inside a statement block's braces, when non-empty
fn inner_block_range(block: &Node) -> Option<crate::schema::ElementRange> {
    let count = block.named_child_count();
    if count == 0 {
        return None;
    }
    let first = block.named_child(0)?;
    let last = block.named_child(count - 1)?;
    let first_range = get_node_range(&first);
    let last_range = get_node_range(&last);
    Some(crate::schema::ElementRange::new(
        first_range.start_line,
        first_range.start_col,
        last_range.end_line,
        last_range.end_col,
    ))
}

/// `get`/`set` keyword on a method definition, if present
fn accessor_keyword<'a>(node: &Node<'a>) -> Option<&'static str> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "get" => return Some("get"),
            "set" => return Some("set"),
            _ => {}
        }
    }
    None
}

/// Member names of an enum declaration, in source order
fn enum_members(node: &Node, source: &str) -> Vec<String> {
    let Some(body) = node.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut members = Vec::new();
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        match child.kind() {
            "enum_assignment" => {
                if let Some(name) = child.child_by_field_name("name") {
                    members.push(get_node_text(&name, source));
                }
            }
            "property_identifier" => members.push(get_node_text(&child, source)),
            _ => {}
        }
    }
    members
}

fn has_child_token(node: &Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(|c| c.kind() == token);
    result
}

/// Nearest class-like container name for parent links
fn enclosing_container_name(node: &Node, source: &str) -> Option<String> {
    find_first_ancestor(
        node,
        &[
            "class_declaration",
            "abstract_class_declaration",
            "interface_declaration",
            "enum_declaration",
            "internal_module",
        ],
    )
    .and_then(|c| c.child_by_field_name("name"))
    .map(|n| get_node_text(&n, source))
}

fn decorator_name(text: &str) -> String {
    let stripped = text.trim_start_matches('@');
    let end = stripped.find('(').unwrap_or(stripped.len());
    stripped[..end].trim().to_string()
}
