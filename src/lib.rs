//! CodeHem: syntax-aware, multi-language code query and patching engine
//!
//! The engine locates code elements (classes, methods, functions,
//! properties, imports) by compact path expressions, reads their exact text
//! and a stable fragment hash, and applies minimal, atomic modifications
//! with optimistic-concurrency guarantees. Parsing is tree-sitter based;
//! two reference language services ship built in: Python (indent family)
//! and TypeScript/TSX, with JavaScript served through an alias.
//!
//! # Example
//!
//! ```ignore
//! use codehem::{apply_patch, get_text_by_path, PatchMode};
//!
//! let source = "class C:\n    def f(self):\n        return 1\n";
//! let (text, hash) = get_text_by_path(source, "C.f[body]", false)?.unwrap();
//! assert_eq!(text, "return 1");
//!
//! let result = apply_patch(source, "C.f[body]", "return 2\n",
//!                          PatchMode::Replace, Some(&hash), false)?;
//! assert!(result.modified_code.unwrap().contains("return 2"));
//! ```

pub mod builder;
pub mod cli;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod formatter;
pub mod lang;
pub mod manipulator;
pub mod navigator;
pub mod parser;
pub mod postprocess;
pub mod registry;
pub mod resolver;
pub mod retry;
pub mod schema;
pub mod workspace;

// Re-export commonly used types
pub use builder::{ClassSpec, FunctionSpec, ParameterSpec};
pub use engine::CodeHem;
pub use error::{CodeHemError, Result};
pub use lang::{Lang, LangFamily};
pub use registry::{LanguagePlugin, LanguageRegistry};
pub use resolver::{PathExpr, PathTag, Resolution};
pub use schema::{
    Element, ElementKind, ElementRange, ElementTree, PatchMode, PatchResult, PatchStatus,
};
pub use workspace::Workspace;

use std::path::Path;

/// Detect the language of a path or source buffer, returning its code
pub fn detect(source_or_path: &str) -> Result<String> {
    if let Some(service) = registry::global().get_for_path(Path::new(source_or_path)) {
        return Ok(service.code().to_string());
    }
    registry::global()
        .detect(source_or_path)
        .map(|s| s.code().to_string())
        .ok_or_else(|| CodeHemError::UnsupportedLanguage {
            language: "unknown".to_string(),
        })
}

/// Extract the element tree of a buffer in the given language
pub fn extract(source: &str, language_code: &str) -> Result<ElementTree> {
    CodeHem::new(language_code)?.extract(source)
}

/// Text and fragment hash of the element at `path`, detecting the language
pub fn get_text_by_path(
    source: &str,
    path: &str,
    include_extra: bool,
) -> Result<Option<(String, String)>> {
    CodeHem::from_source(source)?.get_text_by_path(source, path, include_extra)
}

/// Fragment hash of the element at `path`, detecting the language
pub fn get_element_hash(source: &str, path: &str) -> Result<Option<String>> {
    CodeHem::from_source(source)?.get_element_hash(source, path)
}

/// Apply a patch to a buffer, detecting the language
pub fn apply_patch(
    source: &str,
    path: &str,
    new_code: &str,
    mode: PatchMode,
    original_hash: Option<&str>,
    dry_run: bool,
) -> Result<PatchResult> {
    CodeHem::from_source(source)?.apply_patch(source, path, new_code, mode, original_hash, dry_run)
}

/// Replace the element at `path` when it exists, otherwise append the
/// fragment to the enclosing container; language detected by sniffing.
pub fn upsert_by_path(source: &str, path: &str, new_code: &str) -> Result<PatchResult> {
    CodeHem::from_source(source)?.upsert_by_path(source, path, new_code)
}

/// Like [`apply_patch`], but failures come back embedded in the structured
/// result instead of as an error value.
pub fn apply_patch_structured(
    source: &str,
    path: &str,
    new_code: &str,
    mode: PatchMode,
    original_hash: Option<&str>,
    dry_run: bool,
) -> PatchResult {
    match apply_patch(source, path, new_code, mode, original_hash, dry_run) {
        Ok(result) => result,
        Err(err) => PatchResult::failed(err.kind(), err.to_string()),
    }
}

/// Open and index a workspace rooted at `root`
pub fn open_workspace(root: impl Into<std::path::PathBuf>) -> Result<Workspace> {
    Workspace::open(root)
}
