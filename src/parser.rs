//! Parser facade: drives the grammar parser and caches trees by content digest
//!
//! Parsing is best-effort; malformed source yields a tree with error nodes
//! that downstream components tolerate. `ParseError` is raised only when the
//! grammar itself cannot initialize.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tree_sitter::{Language, Parser, Tree};

use crate::error::{CodeHemError, Result};
use crate::lang::Lang;

/// Minimum number of cached trees retained per facade
pub const MIN_CACHE_CAPACITY: usize = 128;

type CacheKey = (String, [u8; 32]);

/// A small LRU keyed by `(lang, digest)`; recency is a monotonic tick.
struct TreeLru {
    capacity: usize,
    tick: u64,
    entries: HashMap<CacheKey, (Tree, u64)>,
}

impl TreeLru {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(MIN_CACHE_CAPACITY),
            tick: 0,
            entries: HashMap::new(),
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<Tree> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|(tree, last_used)| {
            *last_used = tick;
            tree.clone()
        })
    }

    fn insert(&mut self, key: CacheKey, tree: Tree) {
        self.tick += 1;
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, last_used))| *last_used)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, (tree, self.tick));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Facade over tree-sitter parsers with a shared, digest-keyed tree cache.
///
/// The facade is a value the host threads through the engine; it is not a
/// hidden singleton, so multi-tenant embedders can hold several.
pub struct ParserFacade {
    cache: Mutex<TreeLru>,
}

impl ParserFacade {
    pub fn new() -> Self {
        Self::with_capacity(MIN_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(TreeLru::new(capacity)),
        }
    }

    /// Parse `source` with the grammar for `lang`.
    ///
    /// Idempotent: the result is cached by `(lang, digest(source))`, so
    /// repeated parses of identical bytes return the cached tree.
    pub fn parse(&self, lang: Lang, source: &str) -> Result<Tree> {
        self.parse_grammar(lang.name(), &lang.tree_sitter_language(), source)
    }

    /// Parse with an explicit grammar, keyed by the plug-in's language code.
    /// This is the entry point language plug-ins go through.
    pub fn parse_grammar(&self, code: &str, language: &Language, source: &str) -> Result<Tree> {
        let key = (code.to_string(), content_digest(source));

        if let Some(tree) = self.cache.lock().get(&key) {
            return Ok(tree);
        }

        let mut parser = Parser::new();
        parser
            .set_language(language)
            .map_err(|e| CodeHemError::Parse {
                message: format!("cannot load {} grammar: {}", code, e),
            })?;

        let tree = parser.parse(source, None).ok_or_else(|| CodeHemError::Parse {
            message: format!("{} parser produced no tree", code),
        })?;

        self.cache.lock().insert(key, tree.clone());
        Ok(tree)
    }

    /// Number of trees currently cached
    pub fn cached_trees(&self) -> usize {
        self.cache.lock().len()
    }
}

impl Default for ParserFacade {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 digest of raw source bytes, used as the cache key
fn content_digest(source: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.finalize().into()
}
