//! Language detection and tree-sitter grammar loading

use std::path::Path;
use tree_sitter::Language;

use crate::error::{CodeHemError, Result};

/// Supported languages for the two reference plug-in families.
///
/// JavaScript sources are parsed with the TypeScript grammar (a superset);
/// the registry exposes `javascript` as an alias of the typescript service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Python,
    TypeScript,
    Tsx,
}

impl Lang {
    /// Detect language from file path extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| CodeHemError::UnsupportedLanguage {
                language: "none".to_string(),
            })?;

        Self::from_extension(ext)
    }

    /// Detect language from file extension string
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" => Ok(Self::Python),
            "ts" | "mts" | "cts" | "js" | "mjs" | "cjs" => Ok(Self::TypeScript),
            "tsx" | "jsx" => Ok(Self::Tsx),
            _ => Err(CodeHemError::UnsupportedLanguage {
                language: ext.to_string(),
            }),
        }
    }

    /// Detect language by sniffing the leading bytes of a source buffer.
    ///
    /// This is a heuristic used when no file extension is available. It looks
    /// at declaration keywords in the first few hundred bytes.
    pub fn sniff(source: &str) -> Option<Self> {
        let head: String = source.lines().take(30).collect::<Vec<_>>().join("\n");

        let python_markers = [
            "def ",
            "import ",
            "from ",
            "class ",
            "self",
            "#!",
            "print(",
        ];
        let brace_markers = [
            "function ",
            "=> ",
            "interface ",
            "const ",
            "let ",
            "export ",
            "namespace ",
            "type ",
        ];

        let python_score: usize = python_markers
            .iter()
            .filter(|m| head.contains(*m))
            .count();
        let brace_score: usize = brace_markers
            .iter()
            .filter(|m| head.contains(*m))
            .count()
            // Braced blocks are a strong signal on their own.
            + usize::from(head.contains("{") && head.contains("}"));

        if python_score == 0 && brace_score == 0 {
            return None;
        }
        if head.contains("def ") && head.contains(':') && !head.contains('{') {
            return Some(Self::Python);
        }
        // Symmetric fast-path: braced blocks with no suite colon and no
        // `def` cannot be Python, even when words like `class` overlap.
        let has_suite_colon = head.lines().any(|l| l.trim_end().ends_with(':'));
        if head.contains('{') && head.contains('}') && !head.contains("def ") && !has_suite_colon {
            return Some(Self::TypeScript);
        }
        if brace_score > python_score {
            Some(Self::TypeScript)
        } else {
            Some(Self::Python)
        }
    }

    /// Get the canonical name of the language
    pub fn name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
        }
    }

    /// Get the tree-sitter Language for parsing
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    /// Get the formatter family for this language
    pub fn family(&self) -> LangFamily {
        match self {
            Self::Python => LangFamily::Indent,
            Self::TypeScript | Self::Tsx => LangFamily::Brace,
        }
    }

    /// Get common file extensions for this language
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py", "pyi"],
            Self::TypeScript => &["ts", "mts", "cts", "js", "mjs", "cjs"],
            Self::Tsx => &["tsx", "jsx"],
        }
    }
}

/// Block-structure families shared by formatter and manipulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LangFamily {
    /// Blocks introduced by `:` and one level of indentation (Python)
    Indent,
    /// Blocks delimited by `{` and `}` (TypeScript, JavaScript)
    Brace,
}

impl LangFamily {
    /// Get the canonical name of the family
    pub fn name(&self) -> &'static str {
        match self {
            Self::Indent => "indent",
            Self::Brace => "brace",
        }
    }

    /// The token that opens a block in this family
    pub fn block_token(&self) -> &'static str {
        match self {
            Self::Indent => ":",
            Self::Brace => "{",
        }
    }
}
