//! Path expressions: parsing and resolution against an element tree
//!
//! Grammar: `segment ("." segment)* ("[" kindTag "]")?` with an optional
//! `FILE.` root prefix. Without a kind tag the resolver prefers methods over
//! properties over static properties over nested classes; same-kind
//! duplicates resolve to the last declaration and flag the result ambiguous.

use tracing::warn;

use crate::error::{CodeHemError, Result};
use crate::schema::{fragment_hash, Element, ElementKind, ElementRange, ElementTree};

/// Root segment naming the file scope, allowed as an optional prefix
pub const ROOT_SEGMENT: &str = "FILE";

/// Parsed trailing tag of a path expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTag {
    /// Exact-kind filter, e.g. `[method]`, `[property_getter]`
    Kind(ElementKind),
    /// Full element: signature and body
    Def,
    /// Body only (callables) or initializer (properties)
    Body,
    /// The synthetic imports element
    Imports,
}

/// A parsed path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub segments: Vec<String>,
    pub tag: Option<PathTag>,
}

impl PathExpr {
    /// Parse a path expression, rejecting empty segments and unknown tags
    pub fn parse(path: &str) -> Result<Self> {
        let syntax_error = |message: &str| CodeHemError::PathSyntax {
            path: path.to_string(),
            message: message.to_string(),
        };

        if path.trim().is_empty() {
            return Err(syntax_error("empty path"));
        }

        let mut remainder = path.trim();
        let mut tag = None;

        if let Some(open) = remainder.find('[') {
            let close = remainder
                .rfind(']')
                .ok_or_else(|| syntax_error("unterminated kind tag"))?;
            if close != remainder.len() - 1 {
                return Err(syntax_error("kind tag must terminate the path"));
            }
            tag = Some(parse_tag(&remainder[open + 1..close]).ok_or_else(|| {
                syntax_error("unknown kind tag")
            })?);
            remainder = &remainder[..open];
        }

        let mut segments: Vec<String> = Vec::new();
        for part in remainder.split('.') {
            if part.is_empty() {
                return Err(syntax_error("empty segment"));
            }
            if part.contains('[') || part.contains(']') {
                return Err(syntax_error("kind tag allowed on the final segment only"));
            }
            segments.push(part.to_string());
        }

        if segments.first().map(String::as_str) == Some(ROOT_SEGMENT) {
            segments.remove(0);
        }
        if segments.is_empty() && tag.is_none() {
            return Err(syntax_error("path names no element"));
        }

        // `imports` / `FILE.imports` address the synthetic imports element
        if segments.len() == 1 && segments[0] == "imports" && tag.is_none() {
            segments.clear();
            tag = Some(PathTag::Imports);
        }

        Ok(Self { segments, tag })
    }
}

fn parse_tag(tag: &str) -> Option<PathTag> {
    match tag {
        "def" => Some(PathTag::Def),
        "body" => Some(PathTag::Body),
        "imports" => Some(PathTag::Imports),
        kind => kind.parse::<ElementKind>().ok().map(PathTag::Kind),
    }
}

/// Result of resolving a path against a tree
#[derive(Debug, Clone)]
pub struct Resolution {
    pub element: Element,
    /// Effective range after applying the tag (`[body]`, decorators, ...)
    pub range: ElementRange,
    /// Byte-exact content of the effective range
    pub content: String,
    /// Digest of the effective content
    pub hash: String,
    /// Set when the path matched several declarations
    pub ambiguous: bool,
}

/// Preference order when a name matches elements of several kinds
fn kind_rank(kind: ElementKind) -> usize {
    match kind {
        ElementKind::Method => 0,
        ElementKind::Function => 1,
        ElementKind::Property => 2,
        ElementKind::PropertyGetter => 3,
        ElementKind::PropertySetter => 4,
        ElementKind::StaticProperty => 5,
        ElementKind::Class => 6,
        ElementKind::Interface => 7,
        ElementKind::Enum => 8,
        ElementKind::TypeAlias => 9,
        ElementKind::Namespace => 10,
        _ => 11,
    }
}

/// Resolve a path expression against the tree for `source`.
///
/// Returns `Ok(None)` when the path does not resolve; resolution is total,
/// there are no partial matches. `include_extra` widens the effective range
/// to cover attached decorators.
pub fn resolve(
    source: &str,
    tree: &ElementTree,
    path: &str,
    include_extra: bool,
) -> Result<Option<Resolution>> {
    let expr = PathExpr::parse(path)?;
    resolve_expr(source, tree, &expr, include_extra)
}

/// Resolve an already-parsed expression
pub fn resolve_expr(
    source: &str,
    tree: &ElementTree,
    expr: &PathExpr,
    include_extra: bool,
) -> Result<Option<Resolution>> {
    if expr.tag == Some(PathTag::Imports) && expr.segments.is_empty() {
        return Ok(tree.imports().map(|imports| whole_element(imports, false)));
    }

    let Some((final_segment, walk)) = expr.segments.split_last() else {
        return Ok(None);
    };

    // Walk intermediate segments through container elements only
    let mut level: Vec<Element> = tree.elements.clone();
    for segment in walk {
        let next = level
            .iter()
            .filter(|e| e.kind.is_container() && &e.name == segment)
            .last()
            .cloned();
        match next {
            Some(container) => level = container.children,
            None => return Ok(None),
        }
    }

    // Collect final-segment matches, filtered by kind when the tag names one
    let kind_filter = match expr.tag {
        Some(PathTag::Kind(kind)) => Some(kind),
        _ => None,
    };
    let matches: Vec<&Element> = level
        .iter()
        .filter(|e| &e.name == final_segment)
        .filter(|e| kind_filter.map_or(true, |k| e.kind == k))
        .collect();

    if matches.is_empty() {
        return Ok(None);
    }

    let best_rank = matches
        .iter()
        .map(|e| kind_rank(e.kind))
        .min()
        .expect("matches checked non-empty");
    let preferred: Vec<&Element> = matches
        .iter()
        .copied()
        .filter(|e| kind_rank(e.kind) == best_rank)
        .collect();

    // Same-kind duplicates: last declared wins, flagged ambiguous
    let ambiguous = preferred.len() > 1;
    let element = *preferred.last().expect("preferred checked non-empty");
    if ambiguous {
        warn!(
            "path segment '{}' matches {} declarations; using the last",
            final_segment,
            preferred.len()
        );
    }

    let resolution = match expr.tag {
        Some(PathTag::Body) => match body_resolution(source, element, ambiguous) {
            Some(resolution) => resolution,
            None => return Ok(None),
        },
        _ => {
            let mut resolution = whole_element(element, include_extra);
            if include_extra {
                // Re-slice so content covers the decorator block too
                if let Some((start, end)) = resolution.range.to_byte_span(source) {
                    resolution.content = source[start..end].to_string();
                    resolution.hash = fragment_hash(&resolution.content);
                }
            }
            resolution.ambiguous = ambiguous;
            resolution
        }
    };

    Ok(Some(resolution))
}

fn whole_element(element: &Element, include_extra: bool) -> Resolution {
    let range = if include_extra {
        element.range_with_decorators()
    } else {
        element.range
    };
    Resolution {
        element: element.clone(),
        range,
        content: element.content.clone(),
        hash: element.fragment_hash(),
        ambiguous: false,
    }
}

/// `[body]` range: callable body, or property initializer; `None` otherwise
fn body_resolution(source: &str, element: &Element, ambiguous: bool) -> Option<Resolution> {
    let range = if element.kind.is_callable() {
        element.body_range()?
    } else if matches!(
        element.kind,
        ElementKind::Property | ElementKind::StaticProperty
    ) {
        element.value_range()?
    } else {
        return None;
    };

    let (start, end) = range.to_byte_span(source)?;
    let content = source[start..end].to_string();
    let hash = fragment_hash(&content);
    Some(Resolution {
        element: element.clone(),
        range,
        content,
        hash,
        ambiguous,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract_raw;
    use crate::lang::Lang;
    use crate::parser::ParserFacade;
    use crate::postprocess::build_tree;

    fn tree_for(lang: Lang, source: &str) -> ElementTree {
        let parsed = ParserFacade::new().parse(lang, source).unwrap();
        build_tree(extract_raw(lang, &parsed, source).unwrap())
    }

    #[test]
    fn test_parse_plain_path() {
        let expr = PathExpr::parse("C.f").unwrap();
        assert_eq!(expr.segments, vec!["C", "f"]);
        assert_eq!(expr.tag, None);
    }

    #[test]
    fn test_parse_tagged_path() {
        let expr = PathExpr::parse("C.f[body]").unwrap();
        assert_eq!(expr.tag, Some(PathTag::Body));

        let expr = PathExpr::parse("C.v[property_setter]").unwrap();
        assert_eq!(
            expr.tag,
            Some(PathTag::Kind(ElementKind::PropertySetter))
        );
    }

    #[test]
    fn test_parse_file_prefix_and_imports() {
        let expr = PathExpr::parse("FILE.C.f").unwrap();
        assert_eq!(expr.segments, vec!["C", "f"]);

        let expr = PathExpr::parse("imports").unwrap();
        assert_eq!(expr.tag, Some(PathTag::Imports));
        assert!(expr.segments.is_empty());

        let expr = PathExpr::parse("FILE.imports").unwrap();
        assert_eq!(expr.tag, Some(PathTag::Imports));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PathExpr::parse("").is_err());
        assert!(PathExpr::parse("C..f").is_err());
        assert!(PathExpr::parse("C.f[bogus]").is_err());
        assert!(PathExpr::parse("C.f[def").is_err());
        assert!(PathExpr::parse("C[class].f").is_err());
        for err in [
            PathExpr::parse("").unwrap_err(),
            PathExpr::parse("C..f").unwrap_err(),
        ] {
            assert_eq!(err.kind(), "PathSyntaxError");
        }
    }

    #[test]
    fn test_resolve_method_body() {
        let source = "class C:\n    def f(self):\n        return 1\n";
        let tree = tree_for(Lang::Python, source);

        let resolution = resolve(source, &tree, "C.f[body]", false)
            .unwrap()
            .unwrap();
        assert_eq!(resolution.content, "return 1");
        assert!(!resolution.ambiguous);
    }

    #[test]
    fn test_resolve_def_equals_whole_element() {
        let source = "class C:\n    def f(self):\n        return 1\n";
        let tree = tree_for(Lang::Python, source);

        let plain = resolve(source, &tree, "C.f", false).unwrap().unwrap();
        let def = resolve(source, &tree, "C.f[def]", false).unwrap().unwrap();
        assert_eq!(plain.content, def.content);
        assert_eq!(plain.hash, def.hash);
        assert!(def.content.starts_with("def f(self):"));
    }

    #[test]
    fn test_resolve_missing_is_none() {
        let source = "class C:\n    def f(self):\n        return 1\n";
        let tree = tree_for(Lang::Python, source);
        assert!(resolve(source, &tree, "C.missing", false).unwrap().is_none());
        assert!(resolve(source, &tree, "D.f", false).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_method_resolves_last_with_flag() {
        let source = "class C:\n    def dup(self):\n        return 1\n\n    def dup(self):\n        return 2\n";
        let tree = tree_for(Lang::Python, source);

        let resolution = resolve(source, &tree, "C.dup", false).unwrap().unwrap();
        assert!(resolution.ambiguous);
        assert!(resolution.content.contains("return 2"));

        let def = resolve(source, &tree, "C.dup[def]", false).unwrap().unwrap();
        assert_eq!(def.range.start_line, 5);
    }

    #[test]
    fn test_accessor_tags() {
        let source = "class C {\n    get v(): number { return 1; }\n    set v(x: number) { }\n}\n";
        let tree = tree_for(Lang::TypeScript, source);

        let getter = resolve(source, &tree, "C.v[property_getter]", false)
            .unwrap()
            .unwrap();
        assert_eq!(getter.element.kind, ElementKind::PropertyGetter);

        let setter = resolve(source, &tree, "C.v[property_setter]", false)
            .unwrap()
            .unwrap();
        assert_eq!(setter.element.kind, ElementKind::PropertySetter);
        assert!(setter.content.starts_with("set v"));
    }

    #[test]
    fn test_body_on_bodiless_kind_is_none() {
        let source = "import os\n\nclass C:\n    pass\n";
        let tree = tree_for(Lang::Python, source);
        // The imports element has no body
        assert!(resolve(source, &tree, "imports[body]", false)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_include_extra_covers_decorators() {
        let source = "class C:\n    @property\n    def v(self):\n        return 1\n";
        let tree = tree_for(Lang::Python, source);

        let without = resolve(source, &tree, "C.v", false).unwrap().unwrap();
        assert!(without.content.starts_with("def v"));

        let with = resolve(source, &tree, "C.v", true).unwrap().unwrap();
        assert!(with.content.starts_with("@property"));
        assert_ne!(without.hash, with.hash);
    }

    #[test]
    fn test_imports_resolution() {
        let source = "import os\nimport sys\n\ndef f():\n    pass\n";
        let tree = tree_for(Lang::Python, source);

        let imports = resolve(source, &tree, "imports", false).unwrap().unwrap();
        assert_eq!(imports.content, "import os\nimport sys");
    }
}
