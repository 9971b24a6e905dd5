//! Engine facade: one language service bound to the shared caches
//!
//! `CodeHem` is the per-language entry point tying the parser facade,
//! extractor, post-processor, resolver, and manipulator together. It is a
//! plain value; embedders construct as many as they need and may share a
//! parser facade between them.

use std::path::Path;
use std::sync::Arc;

use crate::builder::{ClassSpec, FunctionSpec};
use crate::error::{CodeHemError, Result};
use crate::lang::LangFamily;
use crate::manipulator;
use crate::parser::ParserFacade;
use crate::postprocess::build_tree;
use crate::registry::{self, LanguagePlugin, LanguageRegistry};
use crate::resolver::{self, Resolution};
use crate::schema::{ElementKind, ElementTree, PatchMode, PatchResult};

/// Language-agnostic engine for one language service
pub struct CodeHem {
    plugin: Arc<dyn LanguagePlugin>,
    parsers: Arc<ParserFacade>,
}

impl CodeHem {
    /// Create an engine for a language code registered in the global registry
    pub fn new(language_code: &str) -> Result<Self> {
        Self::with_registry(registry::global(), language_code)
    }

    /// Create an engine against a custom registry
    pub fn with_registry(registry: &LanguageRegistry, language_code: &str) -> Result<Self> {
        let plugin = registry.get(language_code).ok_or_else(|| {
            CodeHemError::UnsupportedLanguage {
                language: language_code.to_string(),
            }
        })?;
        Ok(Self::from_plugin(plugin, Arc::new(ParserFacade::new())))
    }

    /// Create an engine from a resolved plug-in and a shared parser facade
    pub fn from_plugin(plugin: Arc<dyn LanguagePlugin>, parsers: Arc<ParserFacade>) -> Self {
        Self { plugin, parsers }
    }

    /// Create an engine based on a file's extension
    pub fn from_file_path(path: &Path) -> Result<Self> {
        let plugin = registry::global().get_for_path(path).ok_or_else(|| {
            CodeHemError::UnsupportedLanguage {
                language: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            }
        })?;
        Ok(Self::from_plugin(plugin, Arc::new(ParserFacade::new())))
    }

    /// Create an engine by sniffing the source buffer
    pub fn from_source(source: &str) -> Result<Self> {
        let plugin = registry::global().detect(source).ok_or_else(|| {
            CodeHemError::UnsupportedLanguage {
                language: "unknown".to_string(),
            }
        })?;
        Ok(Self::from_plugin(plugin, Arc::new(ParserFacade::new())))
    }

    pub fn language_code(&self) -> &str {
        self.plugin.code()
    }

    pub fn family(&self) -> LangFamily {
        self.plugin.family()
    }

    /// Extract the element tree for a buffer
    pub fn extract(&self, source: &str) -> Result<ElementTree> {
        let tree = self
            .parsers
            .parse_grammar(self.plugin.code(), &self.plugin.grammar(), source)?;
        let records = self.plugin.extract(&tree, source)?;
        Ok(build_tree(records))
    }

    /// Resolve a path against a buffer
    pub fn resolve(&self, source: &str, path: &str, include_extra: bool) -> Result<Option<Resolution>> {
        let tree = self.extract(source)?;
        resolver::resolve(source, &tree, path, include_extra)
    }

    /// Exact text and fragment hash of the element at `path`
    pub fn get_text_by_path(
        &self,
        source: &str,
        path: &str,
        include_extra: bool,
    ) -> Result<Option<(String, String)>> {
        Ok(self
            .resolve(source, path, include_extra)?
            .map(|r| (r.content, r.hash)))
    }

    /// Fragment hash of the element at `path`
    pub fn get_element_hash(&self, source: &str, path: &str) -> Result<Option<String>> {
        Ok(self.resolve(source, path, false)?.map(|r| r.hash))
    }

    /// 1-based inclusive line range of the element at `path`
    pub fn find_by_path(&self, source: &str, path: &str) -> Result<Option<(usize, usize)>> {
        Ok(self
            .resolve(source, path, false)?
            .map(|r| (r.range.start_line, r.range.end_line)))
    }

    /// Apply a patch to an in-memory buffer
    pub fn apply_patch(
        &self,
        source: &str,
        path: &str,
        new_code: &str,
        mode: PatchMode,
        original_hash: Option<&str>,
        dry_run: bool,
    ) -> Result<PatchResult> {
        let tree = self.extract(source)?;
        manipulator::apply(
            source,
            &tree,
            self.family(),
            path,
            new_code,
            mode,
            original_hash,
            dry_run,
        )
    }

    /// Replace the element at `path` when it exists, otherwise append the
    /// fragment after the last element of the enclosing container.
    pub fn upsert_by_path(&self, source: &str, path: &str, new_code: &str) -> Result<PatchResult> {
        if self.resolve(source, path, false)?.is_some() {
            return self.apply_patch(source, path, new_code, PatchMode::Replace, None, false);
        }

        let expr = resolver::PathExpr::parse(path)?;
        let parent_segments = &expr.segments[..expr.segments.len().saturating_sub(1)];
        let tree = self.extract(source)?;

        let anchor = if parent_segments.is_empty() {
            last_addressable(&tree.elements).map(|e| e.name.clone())
        } else {
            let parent_path = parent_segments.join(".");
            let parent = resolver::resolve(source, &tree, &parent_path, false)?;
            parent.and_then(|p| {
                last_addressable(&p.element.children)
                    .map(|child| format!("{}.{}", parent_path, child.name))
            })
        };

        match anchor {
            Some(anchor_path) => {
                self.apply_patch(source, &anchor_path, new_code, PatchMode::Append, None, false)
            }
            None => Err(CodeHemError::ElementNotFound {
                path: path.to_string(),
            }),
        }
    }

    /// Classify a pasted fragment by extracting it in isolation
    pub fn detect_element_type(&self, fragment: &str) -> Result<ElementKind> {
        let tree = self.extract(fragment)?;
        if let Some(first) = tree.elements.first() {
            if first.kind == ElementKind::Function
                && first
                    .children
                    .first()
                    .map(|c| c.kind == ElementKind::Parameter && c.name == "self")
                    .unwrap_or(false)
            {
                return Ok(ElementKind::Method);
            }
            return Ok(first.kind);
        }

        // Brace-family member fragments only parse inside a class body
        if self.family() == LangFamily::Brace {
            let probe = format!("class __Probe {{\n{}\n}}\n", fragment);
            let probe_tree = self.extract(&probe)?;
            if let Some(class) = probe_tree.elements.first() {
                if let Some(member) = class.children.first() {
                    return Ok(member.kind);
                }
            }
        }

        Ok(ElementKind::MetaElement)
    }

    /// Render and append a new function at file scope
    pub fn new_function(&self, source: &str, spec: &FunctionSpec) -> Result<PatchResult> {
        let fragment = spec.render(self.family());
        let tree = self.extract(source)?;
        match last_addressable(&tree.elements) {
            Some(last) => self.apply_patch(
                source,
                &last.name.clone(),
                &fragment,
                PatchMode::Append,
                None,
                false,
            ),
            None => Err(CodeHemError::Validation {
                message: "buffer has no elements to anchor the new function".to_string(),
            }),
        }
    }

    /// Render and append a new method to the class at `class_path`
    pub fn new_method(
        &self,
        source: &str,
        class_path: &str,
        spec: &FunctionSpec,
    ) -> Result<PatchResult> {
        let fragment = spec.render_method(self.family());
        let tree = self.extract(source)?;
        let class = resolver::resolve(source, &tree, class_path, false)?.ok_or_else(|| {
            CodeHemError::ElementNotFound {
                path: class_path.to_string(),
            }
        })?;

        let anchor = last_addressable(&class.element.children).ok_or_else(|| {
            CodeHemError::Validation {
                message: format!("class '{}' has no members to anchor the new method", class_path),
            }
        })?;

        let anchor_path = format!("{}.{}", class_path, anchor.name);
        self.apply_patch(source, &anchor_path, &fragment, PatchMode::Append, None, false)
    }

    /// Render and append a new class at file scope
    pub fn new_class(&self, source: &str, spec: &ClassSpec) -> Result<PatchResult> {
        let fragment = spec.render(self.family());
        let tree = self.extract(source)?;
        match last_addressable(&tree.elements) {
            Some(last) => self.apply_patch(
                source,
                &last.name.clone(),
                &fragment,
                PatchMode::Append,
                None,
                false,
            ),
            None => Err(CodeHemError::Validation {
                message: "buffer has no elements to anchor the new class".to_string(),
            }),
        }
    }
}

/// Last element that a path expression can address by name
fn last_addressable(elements: &[crate::schema::Element]) -> Option<&crate::schema::Element> {
    elements.iter().rev().find(|e| {
        !e.name.is_empty()
            && !matches!(
                e.kind,
                ElementKind::Parameter | ElementKind::ReturnValue | ElementKind::Decorator
            )
    })
}
