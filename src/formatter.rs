//! Fragment formatters for the indent and brace families
//!
//! Normalization treats the fragment's first line as the anchor: its own
//! indentation is discarded, and continuation lines are re-based onto the
//! target indent by their offset from the shallowest continuation line. In
//! the indent family a header line ending in `:` pushes its suite one level
//! deeper. This makes extracted fragments (absolute continuation indent) and
//! hand-written fragments (relative indent) normalize identically. Empty
//! lines stay empty; no line ever gains trailing whitespace.

use crate::lang::LangFamily;

/// Formatter configuration supplied by a language plug-in
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    pub family: LangFamily,
    pub indent_unit: &'static str,
}

impl Formatter {
    pub fn new(family: LangFamily) -> Self {
        Self {
            family,
            indent_unit: "    ",
        }
    }

    /// The token that introduces a block in this family
    pub fn block_token(&self) -> &'static str {
        self.family.block_token()
    }

    /// Re-base a fragment onto `target_indent`, indenting every line
    pub fn normalize(&self, code: &str, target_indent: &str) -> String {
        self.reindent(code, target_indent, false)
    }

    /// Like [`Formatter::normalize`], but the first line carries no indent;
    /// used when splicing at a byte position already past the indentation.
    pub fn normalize_for_splice(&self, code: &str, target_indent: &str) -> String {
        self.reindent(code, target_indent, true)
    }

    fn reindent(&self, code: &str, target: &str, bare_first: bool) -> String {
        let unified = code.replace("\r\n", "\n");
        let mut lines = unified.lines();
        let Some(first_raw) = lines.next() else {
            return String::new();
        };
        let first = first_raw.trim_start();
        let continuation: Vec<&str> = lines.collect();

        let common = continuation
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| leading_whitespace(l).len())
            .min()
            .unwrap_or(0);

        // An indent-family header owns the suite below it
        let suite_extra = if self.family == LangFamily::Indent && first.trim_end().ends_with(':') {
            self.indent_unit
        } else {
            ""
        };

        let mut out = Vec::with_capacity(continuation.len() + 1);
        if first.is_empty() {
            out.push(String::new());
        } else if bare_first {
            out.push(first.to_string());
        } else {
            out.push(format!("{}{}", target, first));
        }

        for line in continuation {
            if line.trim().is_empty() {
                out.push(String::new());
            } else {
                out.push(format!("{}{}{}", target, suite_extra, &line[common..]));
            }
        }

        out.join("\n")
    }
}

/// Leading whitespace of a line
pub fn leading_whitespace(line: &str) -> &str {
    let end = line
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    &line[..end]
}

/// The file's dominant line ending; LF wins ties
pub fn dominant_line_ending(source: &str) -> &'static str {
    let crlf = source.matches("\r\n").count();
    let lf = source.matches('\n').count() - crlf;
    if crlf > lf {
        "\r\n"
    } else {
        "\n"
    }
}

/// Strip the longest common leading whitespace from all non-empty lines
pub fn dedent(code: &str) -> String {
    let unified = code.replace("\r\n", "\n");
    let common = unified
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l).len())
        .min()
        .unwrap_or(0);

    unified
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[common..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
