//! Manipulation engine: replace / prepend / append at element boundaries
//!
//! Rewrites happen as byte splices at the resolved range. Outside the
//! touched range the buffer is preserved byte-for-byte. An optional
//! `original_hash` enables optimistic-concurrency conflict detection.

use similar::TextDiff;

use crate::error::{CodeHemError, Result};
use crate::formatter::{dominant_line_ending, leading_whitespace, Formatter};
use crate::lang::LangFamily;
use crate::resolver::{resolve, Resolution};
use crate::schema::{
    fragment_hash, line_start_offsets, ElementTree, PatchMode, PatchResult, PatchStatus,
};

/// Apply a patch to an in-memory buffer.
///
/// Resolves `path` against `tree` (which must have been extracted from
/// `source`), verifies `original_hash` when given, normalizes `new_code`
/// through the family formatter, and splices. On `dry_run` the result
/// carries a unified diff and the buffer is left untouched.
#[allow(clippy::too_many_arguments)]
pub fn apply(
    source: &str,
    tree: &ElementTree,
    family: LangFamily,
    path: &str,
    new_code: &str,
    mode: PatchMode,
    original_hash: Option<&str>,
    dry_run: bool,
) -> Result<PatchResult> {
    if new_code.trim().is_empty() {
        return Err(CodeHemError::Validation {
            message: "new code must not be empty".to_string(),
        });
    }

    let resolution = resolve(source, tree, path, false)?.ok_or_else(|| {
        CodeHemError::ElementNotFound {
            path: path.to_string(),
        }
    })?;

    if let Some(expected) = original_hash {
        if expected != resolution.hash {
            return Err(CodeHemError::WriteConflict {
                path: path.to_string(),
                expected: expected.to_string(),
                actual: resolution.hash.clone(),
            });
        }
    }

    let formatter = Formatter::new(family);
    let line_ending = dominant_line_ending(source);
    let (splice_start, splice_end, fragment) =
        build_splice(source, &resolution, &formatter, new_code, mode, line_ending)?;

    let mut modified = String::with_capacity(source.len() + fragment.len());
    modified.push_str(&source[..splice_start]);
    modified.push_str(&fragment);
    modified.push_str(&source[splice_end..]);

    let (lines_added, lines_removed) = line_stats(source, &modified);

    let new_hash = match mode {
        PatchMode::Replace => {
            fragment_hash(fragment.trim_start_matches(|c| c == ' ' || c == '\t'))
        }
        _ => resolution.hash.clone(),
    };

    let diff = dry_run.then(|| {
        TextDiff::from_lines(source, modified.as_str())
            .unified_diff()
            .context_radius(3)
            .header("a/original", "b/modified")
            .to_string()
    });

    Ok(PatchResult {
        status: PatchStatus::Ok,
        lines_added,
        lines_removed,
        new_hash,
        modified_code: Some(modified),
        diff,
        error: None,
    })
}

/// Compute the byte span to replace and the replacement fragment
fn build_splice(
    source: &str,
    resolution: &Resolution,
    formatter: &Formatter,
    new_code: &str,
    mode: PatchMode,
    line_ending: &str,
) -> Result<(usize, usize, String)> {
    let (start, end) = resolution
        .range
        .to_byte_span(source)
        .ok_or_else(|| CodeHemError::Validation {
            message: "resolved range exceeds the buffer".to_string(),
        })?;

    let starts = line_start_offsets(source);
    let line_start = starts[resolution.range.start_line - 1];
    let prefix = &source[line_start..start];
    let first_line = source[line_start..].lines().next().unwrap_or("");
    let inline = !prefix.trim().is_empty();
    let indent = if inline {
        leading_whitespace(first_line).to_string()
    } else {
        prefix.to_string()
    };

    let spliced = match mode {
        PatchMode::Replace => {
            let fragment = with_line_ending(
                &formatter.normalize_for_splice(new_code, &indent),
                line_ending,
            );
            (start, end, fragment)
        }
        PatchMode::Append => {
            let body = formatter.normalize(new_code, &indent);
            let fragment = format!("{}{}", line_ending, with_line_ending(&body, line_ending));
            (end, end, fragment)
        }
        PatchMode::Prepend => {
            if inline {
                // Element shares its line with other code; insert directly
                // before it rather than on a line of its own.
                let fragment = format!("{} ", new_code.trim());
                (start, start, fragment)
            } else {
                let body = formatter.normalize(new_code, &indent);
                let fragment =
                    format!("{}{}", with_line_ending(&body, line_ending), line_ending);
                (line_start, line_start, fragment)
            }
        }
    };

    Ok(spliced)
}

/// Convert a fragment's internal newlines to the file's dominant ending
fn with_line_ending(fragment: &str, line_ending: &str) -> String {
    if line_ending == "\n" {
        fragment.to_string()
    } else {
        fragment.replace('\n', line_ending)
    }
}

/// Added/removed line counts between two buffers
fn line_stats(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    let mut added = 0;
    let mut removed = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Insert => added += 1,
            similar::ChangeTag::Delete => removed += 1,
            similar::ChangeTag::Equal => {}
        }
    }
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract_raw;
    use crate::lang::Lang;
    use crate::parser::ParserFacade;
    use crate::postprocess::build_tree;

    fn setup(lang: Lang, source: &str) -> ElementTree {
        let parsed = ParserFacade::new().parse(lang, source).unwrap();
        build_tree(extract_raw(lang, &parsed, source).unwrap())
    }

    #[test]
    fn test_replace_method_body_indent_family() {
        let source = "class C:\n    def f(self):\n        return 1\n";
        let tree = setup(Lang::Python, source);

        let result = apply(
            source,
            &tree,
            LangFamily::Indent,
            "C.f[body]",
            "return 2\n",
            PatchMode::Replace,
            None,
            false,
        )
        .unwrap();

        let modified = result.modified_code.as_deref().unwrap();
        assert_eq!(modified, "class C:\n    def f(self):\n        return 2\n");
        assert_eq!(result.lines_added, 1);
        assert_eq!(result.lines_removed, 1);
        assert_ne!(result.new_hash, fragment_hash("return 1"));
        assert_eq!(result.new_hash, fragment_hash("return 2"));
    }

    #[test]
    fn test_append_sibling_method_brace_family() {
        let source = "class C { a() { return 1 } }\n";
        let tree = setup(Lang::TypeScript, source);

        let result = apply(
            source,
            &tree,
            LangFamily::Brace,
            "C.a",
            "b() { return 2 }",
            PatchMode::Append,
            None,
            false,
        )
        .unwrap();

        let modified = result.modified_code.as_deref().unwrap();
        assert!(modified.contains("a() { return 1 }"));
        assert!(modified.contains("b() { return 2 }"));

        // Re-extract: class C now has both methods, in order
        let new_tree = setup(Lang::TypeScript, modified);
        let class = new_tree.elements.iter().find(|e| e.name == "C").unwrap();
        let methods: Vec<&str> = class
            .children
            .iter()
            .filter(|c| c.kind == crate::schema::ElementKind::Method)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(methods, vec!["a", "b"]);
    }

    #[test]
    fn test_conflict_detection() {
        let source = "class C:\n    def m(self):\n        return 1\n";
        let tree = setup(Lang::Python, source);
        let stale_hash = fragment_hash("def m(self):\n        return 0");

        let err = apply(
            source,
            &tree,
            LangFamily::Indent,
            "C.m",
            "def m(self):\n    return 2\n",
            PatchMode::Replace,
            Some(&stale_hash),
            false,
        )
        .unwrap_err();

        assert_eq!(err.kind(), "WriteConflictError");
    }

    #[test]
    fn test_round_trip_replace_is_identity() {
        let source = "class C:\n    def f(self):\n        return 1\n";
        let tree = setup(Lang::Python, source);
        let current = resolve(source, &tree, "C.f", false).unwrap().unwrap();

        let result = apply(
            source,
            &tree,
            LangFamily::Indent,
            "C.f",
            &current.content,
            PatchMode::Replace,
            Some(&current.hash),
            false,
        )
        .unwrap();

        assert_eq!(result.modified_code.as_deref(), Some(source));
        assert_eq!(result.lines_added, result.lines_removed);
        assert_eq!(result.lines_added, 0);
    }

    #[test]
    fn test_prepend_method() {
        let source = "class C:\n    def b(self):\n        return 2\n";
        let tree = setup(Lang::Python, source);

        let result = apply(
            source,
            &tree,
            LangFamily::Indent,
            "C.b",
            "def a(self):\n    return 1\n",
            PatchMode::Prepend,
            None,
            false,
        )
        .unwrap();

        let modified = result.modified_code.as_deref().unwrap();
        assert_eq!(
            modified,
            "class C:\n    def a(self):\n        return 1\n    def b(self):\n        return 2\n"
        );
    }

    #[test]
    fn test_element_not_found() {
        let source = "def f():\n    pass\n";
        let tree = setup(Lang::Python, source);
        let err = apply(
            source,
            &tree,
            LangFamily::Indent,
            "g",
            "pass\n",
            PatchMode::Replace,
            None,
            false,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "ElementNotFoundError");
    }

    #[test]
    fn test_empty_code_rejected() {
        let source = "def f():\n    pass\n";
        let tree = setup(Lang::Python, source);
        let err = apply(
            source,
            &tree,
            LangFamily::Indent,
            "f",
            "   \n",
            PatchMode::Replace,
            None,
            false,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn test_dry_run_produces_diff() {
        let source = "def f():\n    return 1\n";
        let tree = setup(Lang::Python, source);

        let result = apply(
            source,
            &tree,
            LangFamily::Indent,
            "f[body]",
            "return 2\n",
            PatchMode::Replace,
            None,
            true,
        )
        .unwrap();

        let diff = result.diff.as_deref().unwrap();
        assert!(diff.contains("-    return 1"));
        assert!(diff.contains("+    return 2"));
    }

    #[test]
    fn test_crlf_buffer_keeps_crlf_fragment() {
        let source = "class C:\r\n    def f(self):\r\n        return 1\r\n";
        let tree = setup(Lang::Python, source);

        let result = apply(
            source,
            &tree,
            LangFamily::Indent,
            "C.f",
            "def g(self):\n    return 2\n",
            PatchMode::Append,
            None,
            false,
        )
        .unwrap();

        let modified = result.modified_code.as_deref().unwrap();
        assert!(modified.contains("def g(self):\r\n        return 2"));
        assert!(!modified.contains("return 2\n\r"));
    }
}
