//! Plug-in registry: language services, extension mapping, aliases
//!
//! A plug-in is a value implementing [`LanguagePlugin`]: grammar binding,
//! element extraction, formatter family, and sniffing. The process-wide
//! registry is populated with the built-in services at startup and is
//! effectively read-only afterwards; embedders can also build private
//! registries.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tree_sitter::{Language, Tree};

use crate::error::{CodeHemError, Result};
use crate::extractor::{self, RawElement};
use crate::formatter::Formatter;
use crate::lang::{Lang, LangFamily};

/// The capability set a language plug-in provides
pub trait LanguagePlugin: Send + Sync {
    /// Registry code, e.g. `python`, `typescript`
    fn code(&self) -> &str;

    /// File extensions served by this plug-in, without dots
    fn extensions(&self) -> &[&str];

    /// Formatter family for block structure
    fn family(&self) -> LangFamily;

    /// The tree-sitter grammar
    fn grammar(&self) -> Language;

    /// Run element extraction over a parsed tree
    fn extract(&self, tree: &Tree, source: &str) -> Result<Vec<RawElement>>;

    /// Confidence in [0, 1] that a buffer is written in this language
    fn sniff_confidence(&self, source: &str) -> f32;

    /// Formatter configured for this plug-in's family
    fn formatter(&self) -> Formatter {
        Formatter::new(self.family())
    }
}

/// Built-in Python service (indent family)
pub struct PythonPlugin;

impl LanguagePlugin for PythonPlugin {
    fn code(&self) -> &str {
        "python"
    }

    fn extensions(&self) -> &[&str] {
        Lang::Python.extensions()
    }

    fn family(&self) -> LangFamily {
        LangFamily::Indent
    }

    fn grammar(&self) -> Language {
        Lang::Python.tree_sitter_language()
    }

    fn extract(&self, tree: &Tree, source: &str) -> Result<Vec<RawElement>> {
        extractor::extract_raw(Lang::Python, tree, source)
    }

    fn sniff_confidence(&self, source: &str) -> f32 {
        match Lang::sniff(source) {
            Some(Lang::Python) => 1.0,
            _ => 0.0,
        }
    }
}

/// Built-in TypeScript service (brace family); also serves JavaScript
/// through the `javascript` alias, since the grammar is a superset.
pub struct TypeScriptPlugin {
    lang: Lang,
}

impl TypeScriptPlugin {
    pub fn new() -> Self {
        Self {
            lang: Lang::TypeScript,
        }
    }

    pub fn tsx() -> Self {
        Self { lang: Lang::Tsx }
    }
}

impl Default for TypeScriptPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for TypeScriptPlugin {
    fn code(&self) -> &str {
        self.lang.name()
    }

    fn extensions(&self) -> &[&str] {
        self.lang.extensions()
    }

    fn family(&self) -> LangFamily {
        LangFamily::Brace
    }

    fn grammar(&self) -> Language {
        self.lang.tree_sitter_language()
    }

    fn extract(&self, tree: &Tree, source: &str) -> Result<Vec<RawElement>> {
        extractor::extract_raw(self.lang, tree, source)
    }

    fn sniff_confidence(&self, source: &str) -> f32 {
        match Lang::sniff(source) {
            Some(Lang::TypeScript) | Some(Lang::Tsx) => 1.0,
            _ => 0.0,
        }
    }
}

/// Maps language codes, aliases, and file extensions to services
pub struct LanguageRegistry {
    services: RwLock<HashMap<String, Arc<dyn LanguagePlugin>>>,
    aliases: RwLock<HashMap<String, String>>,
    extensions: RwLock<HashMap<String, String>>,
}

impl LanguageRegistry {
    /// An empty registry, for embedders providing their own plug-ins
    pub fn empty() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            extensions: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding the built-in services and standard aliases
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry
            .register(Arc::new(PythonPlugin))
            .expect("fresh registry accepts python");
        registry
            .register(Arc::new(TypeScriptPlugin::new()))
            .expect("fresh registry accepts typescript");
        registry
            .register(Arc::new(TypeScriptPlugin::tsx()))
            .expect("fresh registry accepts tsx");
        registry
            .register_alias("javascript", "typescript")
            .expect("typescript is registered");
        registry
            .register_alias("py", "python")
            .expect("python is registered");
        registry
            .register_alias("ts", "typescript")
            .expect("typescript is registered");
        registry
    }

    /// Register a service under its code and extensions.
    ///
    /// Idempotent for the same instance; registering a different
    /// implementation under an existing code is a plug-in error.
    pub fn register(&self, plugin: Arc<dyn LanguagePlugin>) -> Result<()> {
        let code = plugin.code().to_string();
        let mut services = self.services.write();

        if let Some(existing) = services.get(&code) {
            if Arc::ptr_eq(existing, &plugin) {
                return Ok(());
            }
            return Err(CodeHemError::Plugin {
                message: format!("language '{}' already registered with a different service", code),
            });
        }

        let mut extensions = self.extensions.write();
        for ext in plugin.extensions() {
            extensions.insert(ext.to_lowercase(), code.clone());
        }
        services.insert(code, plugin);
        Ok(())
    }

    /// Register an alias code resolving to an existing service
    pub fn register_alias(&self, alias: &str, code: &str) -> Result<()> {
        if !self.services.read().contains_key(code) {
            return Err(CodeHemError::Plugin {
                message: format!("alias '{}' targets unregistered language '{}'", alias, code),
            });
        }
        let mut aliases = self.aliases.write();
        if let Some(existing) = aliases.get(alias) {
            if existing == code {
                return Ok(());
            }
            return Err(CodeHemError::Plugin {
                message: format!("alias '{}' already resolves to '{}'", alias, existing),
            });
        }
        aliases.insert(alias.to_string(), code.to_string());
        Ok(())
    }

    /// Resolve a service by code or alias
    pub fn get(&self, code: &str) -> Option<Arc<dyn LanguagePlugin>> {
        let services = self.services.read();
        if let Some(service) = services.get(code) {
            return Some(Arc::clone(service));
        }
        let aliases = self.aliases.read();
        aliases
            .get(code)
            .and_then(|target| services.get(target))
            .map(Arc::clone)
    }

    /// Resolve a service by file extension
    pub fn get_for_extension(&self, ext: &str) -> Option<Arc<dyn LanguagePlugin>> {
        let code = self.extensions.read().get(&ext.to_lowercase()).cloned()?;
        self.get(&code)
    }

    /// Resolve a service by file path
    pub fn get_for_path(&self, path: &Path) -> Option<Arc<dyn LanguagePlugin>> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.get_for_extension(ext))
    }

    /// Resolve a service by sniffing a buffer's leading bytes
    pub fn detect(&self, source: &str) -> Option<Arc<dyn LanguagePlugin>> {
        let services = self.services.read();
        services
            .values()
            .map(|s| (s.sniff_confidence(source), s))
            .filter(|(confidence, _)| *confidence > 0.0)
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, service)| Arc::clone(service))
    }

    /// Registered language codes, sorted
    pub fn supported_languages(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.services.read().keys().cloned().collect();
        codes.sort();
        codes
    }
}

/// The process-wide registry with built-in services
pub fn global() -> &'static LanguageRegistry {
    static REGISTRY: Lazy<LanguageRegistry> = Lazy::new(LanguageRegistry::with_builtins);
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_resolution() {
        let registry = LanguageRegistry::with_builtins();
        assert!(registry.get("python").is_some());
        assert!(registry.get("typescript").is_some());
        assert!(registry.get("javascript").is_some());
        assert!(registry.get("cobol").is_none());
    }

    #[test]
    fn test_extension_resolution() {
        let registry = LanguageRegistry::with_builtins();
        assert_eq!(registry.get_for_extension("py").unwrap().code(), "python");
        assert_eq!(registry.get_for_extension("ts").unwrap().code(), "typescript");
        assert_eq!(registry.get_for_extension("js").unwrap().code(), "typescript");
        assert_eq!(registry.get_for_extension("tsx").unwrap().code(), "tsx");
        assert!(registry.get_for_extension("rb").is_none());

        let path = Path::new("pkg/module.PY");
        assert!(registry.get_for_path(path).is_some());
    }

    #[test]
    fn test_register_is_idempotent_for_same_instance() {
        let registry = LanguageRegistry::empty();
        let plugin: Arc<dyn LanguagePlugin> = Arc::new(PythonPlugin);
        registry.register(Arc::clone(&plugin)).unwrap();
        registry.register(plugin).unwrap();
        assert_eq!(registry.supported_languages(), vec!["python"]);
    }

    #[test]
    fn test_double_registration_conflicts() {
        let registry = LanguageRegistry::empty();
        registry.register(Arc::new(PythonPlugin)).unwrap();
        let err = registry.register(Arc::new(PythonPlugin)).unwrap_err();
        assert_eq!(err.kind(), "PluginError");
    }

    #[test]
    fn test_alias_rules() {
        let registry = LanguageRegistry::empty();
        registry.register(Arc::new(TypeScriptPlugin::new())).unwrap();

        registry.register_alias("javascript", "typescript").unwrap();
        // Same mapping again is fine
        registry.register_alias("javascript", "typescript").unwrap();

        assert!(registry.register_alias("javascript", "python").is_err());
        assert!(registry.register_alias("rb", "ruby").is_err());
    }

    #[test]
    fn test_detection_by_sniffing() {
        let registry = LanguageRegistry::with_builtins();

        let python = registry
            .detect("import os\n\ndef main():\n    pass\n")
            .unwrap();
        assert_eq!(python.code(), "python");

        let ts = registry
            .detect("export function main(): void {\n    return;\n}\n")
            .unwrap();
        assert_eq!(ts.family(), LangFamily::Brace);

        assert!(registry.detect("").is_none());
    }
}
