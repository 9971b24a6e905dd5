//! Core data model: element kinds, ranges, the element tree, and patch results
//!
//! All coordinates on the public surface are 1-based; lines are inclusive.
//! `Element.content` is the byte-exact source slice the element occupies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Closed enumeration of element kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Class,
    Interface,
    Function,
    Method,
    Property,
    PropertyGetter,
    PropertySetter,
    StaticProperty,
    Import,
    TypeAlias,
    Enum,
    Namespace,
    Decorator,
    Parameter,
    ReturnValue,
    MetaElement,
}

impl ElementKind {
    /// Canonical lowercase name, matching the path-expression kind tags
    pub fn name(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Function => "function",
            Self::Method => "method",
            Self::Property => "property",
            Self::PropertyGetter => "property_getter",
            Self::PropertySetter => "property_setter",
            Self::StaticProperty => "static_property",
            Self::Import => "import",
            Self::TypeAlias => "type_alias",
            Self::Enum => "enum",
            Self::Namespace => "namespace",
            Self::Decorator => "decorator",
            Self::Parameter => "parameter",
            Self::ReturnValue => "return_value",
            Self::MetaElement => "meta_element",
        }
    }

    /// Whether the kind has a callable body (`[body]` resolves for these)
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Self::Function | Self::Method | Self::PropertyGetter | Self::PropertySetter
        )
    }

    /// Whether the kind can own child elements (methods, properties)
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Class | Self::Interface | Self::Namespace | Self::Enum)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ElementKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "class" => Ok(Self::Class),
            "interface" => Ok(Self::Interface),
            "function" => Ok(Self::Function),
            "method" => Ok(Self::Method),
            "property" => Ok(Self::Property),
            "property_getter" => Ok(Self::PropertyGetter),
            "property_setter" => Ok(Self::PropertySetter),
            "static_property" => Ok(Self::StaticProperty),
            "import" => Ok(Self::Import),
            "type_alias" => Ok(Self::TypeAlias),
            "enum" => Ok(Self::Enum),
            "namespace" => Ok(Self::Namespace),
            "decorator" => Ok(Self::Decorator),
            "parameter" => Ok(Self::Parameter),
            "return_value" => Ok(Self::ReturnValue),
            "meta_element" => Ok(Self::MetaElement),
            _ => Err(()),
        }
    }
}

/// A 1-based, line-inclusive source range.
///
/// Columns are 1-based byte columns; `end_col` points one past the last byte
/// of the range on `end_line`, so a range maps to the half-open byte span
/// `[offset(start_line, start_col), offset(end_line, end_col))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRange {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl ElementRange {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Number of lines covered (inclusive)
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Whether this range fully contains another
    pub fn contains(&self, other: &ElementRange) -> bool {
        (self.start_line, self.start_col) <= (other.start_line, other.start_col)
            && (other.end_line, other.end_col) <= (self.end_line, self.end_col)
    }

    /// Whether two ranges share any position without one containing the other
    pub fn overlaps(&self, other: &ElementRange) -> bool {
        let disjoint = (self.end_line, self.end_col) <= (other.start_line, other.start_col)
            || (other.end_line, other.end_col) <= (self.start_line, self.start_col);
        !disjoint && !self.contains(other) && !other.contains(self)
    }

    /// Convert to a half-open byte span within `source`.
    ///
    /// Returns `None` when the range lies outside the buffer.
    pub fn to_byte_span(&self, source: &str) -> Option<(usize, usize)> {
        let starts = line_start_offsets(source);
        let start = *starts.get(self.start_line.checked_sub(1)?)? + (self.start_col - 1);
        let end = *starts.get(self.end_line.checked_sub(1)?)? + (self.end_col - 1);
        if start <= end && end <= source.len() {
            Some((start, end))
        } else {
            None
        }
    }
}

/// Byte offset of the start of every line in `source`
pub fn line_start_offsets(source: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    for (idx, byte) in source.bytes().enumerate() {
        if byte == b'\n' {
            offsets.push(idx + 1);
        }
    }
    offsets
}

/// A typed, ranged piece of source with children and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub kind: ElementKind,

    /// Identifier; empty for the synthetic imports element
    pub name: String,

    /// Byte-exact source slice the element occupies
    pub content: String,

    pub range: ElementRange,

    /// Name of the enclosing container element, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,

    /// Optional type annotation (properties, parameters)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    /// Decorators attached to this element, in source order
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub decorators: Vec<Element>,

    /// Child elements in declaration order
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<Element>,

    /// Kind-specific extras (default values, accessor flags, body ranges)
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub additional_data: Map<String, Value>,
}

impl Element {
    pub fn new(kind: ElementKind, name: impl Into<String>, content: String, range: ElementRange) -> Self {
        Self {
            kind,
            name: name.into(),
            content,
            range,
            parent_name: None,
            value_type: None,
            decorators: Vec::new(),
            children: Vec::new(),
            additional_data: Map::new(),
        }
    }

    /// Range extended to include the attached decorator block, when present
    pub fn range_with_decorators(&self) -> ElementRange {
        match self.decorators.first() {
            Some(first) => ElementRange::new(
                first.range.start_line,
                first.range.start_col,
                self.range.end_line,
                self.range.end_col,
            ),
            None => self.range,
        }
    }

    /// Body range recorded at extraction time, if the element has one
    pub fn body_range(&self) -> Option<ElementRange> {
        range_from_value(self.additional_data.get("body_range")?)
    }

    /// Initializer range for properties, if recorded
    pub fn value_range(&self) -> Option<ElementRange> {
        range_from_value(self.additional_data.get("value_range")?)
    }

    /// Stable digest of the element's canonical content
    pub fn fragment_hash(&self) -> String {
        fragment_hash(&self.content)
    }
}

/// Store a range in `additional_data` as a `[sl, sc, el, ec]` array
pub fn range_to_value(range: ElementRange) -> Value {
    Value::Array(vec![
        Value::from(range.start_line),
        Value::from(range.start_col),
        Value::from(range.end_line),
        Value::from(range.end_col),
    ])
}

fn range_from_value(value: &Value) -> Option<ElementRange> {
    let parts = value.as_array()?;
    if parts.len() != 4 {
        return None;
    }
    Some(ElementRange::new(
        parts[0].as_u64()? as usize,
        parts[1].as_u64()? as usize,
        parts[2].as_u64()? as usize,
        parts[3].as_u64()? as usize,
    ))
}

/// The forest of elements extracted from one file, rooted at file scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementTree {
    pub elements: Vec<Element>,
}

impl ElementTree {
    /// The synthetic imports element, when the file has imports
    pub fn imports(&self) -> Option<&Element> {
        self.elements.iter().find(|e| e.kind == ElementKind::Import)
    }

    /// Depth-first traversal over every element in the tree
    pub fn walk<'a>(&'a self, visitor: &mut impl FnMut(&'a Element)) {
        fn visit<'a>(element: &'a Element, visitor: &mut impl FnMut(&'a Element)) {
            visitor(element);
            for child in &element.children {
                visit(child, visitor);
            }
        }
        for element in &self.elements {
            visit(element, visitor);
        }
    }

    /// Total number of elements, including nested ones
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Normalize content for hashing: LF line endings, trailing newline stripped
pub fn canonicalize(content: &str) -> String {
    let unified = content.replace("\r\n", "\n").replace('\r', "\n");
    unified.trim_end_matches('\n').to_string()
}

/// SHA-256 over the canonical content bytes, hex-encoded.
/// Same bytes produce the same hash across parses.
pub fn fragment_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(content).as_bytes());
    hex::encode(hasher.finalize())
}

/// Patch application modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    Replace,
    Append,
    Prepend,
}

impl FromStr for PatchMode {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            "prepend" => Ok(Self::Prepend),
            _ => Err(()),
        }
    }
}

/// Outcome status of a patch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStatus {
    Ok,
    Error,
}

/// Structured error payload embedded in a failed patch result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchErrorInfo {
    pub kind: String,
    pub message: String,
}

/// Structured result of a patch operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchResult {
    pub status: PatchStatus,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub new_hash: String,

    /// The full modified buffer; omitted on dry-run file writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_code: Option<String>,

    /// Unified diff; present on dry runs only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PatchErrorInfo>,
}

impl PatchResult {
    pub fn failed(kind: &str, message: impl Into<String>) -> Self {
        Self {
            status: PatchStatus::Error,
            lines_added: 0,
            lines_removed: 0,
            new_hash: String::new(),
            modified_code: None,
            diff: None,
            error: Some(PatchErrorInfo {
                kind: kind.to_string(),
                message: message.into(),
            }),
        }
    }
}
