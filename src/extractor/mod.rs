//! Element extraction: per-language queries producing raw element records
//!
//! Each language module supplies one tree-sitter query per supported kind
//! and a handler that builds a [`RawElement`] from the captures. Raw records
//! are language-agnostic; the post-processor folds them into the typed
//! element tree. On missing captures the handlers skip the record and log at
//! debug level; extraction never fails on malformed source.

pub mod python;
pub mod typescript;

use serde_json::{Map, Value};
use tree_sitter::{Node, Tree};

use crate::error::Result;
use crate::lang::Lang;
use crate::navigator::{get_node_range, get_node_text};
use crate::schema::{ElementKind, ElementRange};

/// A parameter sub-record of a callable
#[derive(Debug, Clone)]
pub struct RawParameter {
    pub name: String,
    /// Byte-exact text of the whole parameter declaration
    pub content: String,
    pub range: ElementRange,
    pub value_type: Option<String>,
    pub default_value: Option<String>,
    pub index: usize,
}

/// One extracted element before post-processing
#[derive(Debug, Clone)]
pub struct RawElement {
    pub kind: ElementKind,
    pub name: String,
    pub content: String,
    pub range: ElementRange,
    /// Half-open byte span in the source buffer, used for nesting
    pub byte_span: (usize, usize),
    /// Name of the enclosing class-like container, when known at extraction
    pub parent_name: Option<String>,
    pub value_type: Option<String>,
    pub parameters: Vec<RawParameter>,
    pub return_type: Option<String>,
    /// Byte-exact text and range of the return annotation node, when present
    pub return_node: Option<(String, ElementRange)>,
    /// Range of the callable body (inside the block) or `None`
    pub body_range: Option<ElementRange>,
    /// Range of a property initializer expression, when present
    pub value_range: Option<ElementRange>,
    pub additional: Map<String, Value>,
}

impl RawElement {
    /// Build the common fields from a definition node
    pub fn from_node(kind: ElementKind, name: impl Into<String>, node: &Node, source: &str) -> Self {
        Self {
            kind,
            name: name.into(),
            content: get_node_text(node, source),
            range: get_node_range(node),
            byte_span: (node.start_byte(), node.end_byte()),
            parent_name: None,
            value_type: None,
            parameters: Vec::new(),
            return_type: None,
            return_node: None,
            body_range: None,
            value_range: None,
            additional: Map::new(),
        }
    }
}

/// Run the extractor for `lang` over a parsed tree
pub fn extract_raw(lang: Lang, tree: &Tree, source: &str) -> Result<Vec<RawElement>> {
    let mut records = match lang {
        Lang::Python => python::extract(tree, source)?,
        Lang::TypeScript | Lang::Tsx => typescript::extract(tree, source)?,
    };
    records.sort_by_key(|r| r.byte_span.0);
    Ok(records)
}

/// Strip a leading `: ` from a type annotation node's text
pub(crate) fn clean_annotation(text: &str) -> String {
    text.trim_start_matches(':').trim().to_string()
}
