//! Workspace: indexed view of a directory with serialized, atomic writes
//!
//! Opening a workspace enumerates every file whose extension maps to a
//! registered language and indexes its elements under short path
//! expressions. Index entries carry the file's mtime and are refreshed
//! lazily when the file changed behind the workspace's back. Writes take a
//! per-file fair lock held from the hash check through the rename;
//! concurrent readers share the lock, but a file under write blocks both
//! reads and writes until the write completes.

use ignore::WalkBuilder;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use crate::engine::CodeHem;
use crate::error::{CodeHemError, Result};
use crate::parser::ParserFacade;
use crate::registry::{self, LanguageRegistry};
use crate::retry::RetryPolicy;
use crate::schema::{Element, ElementKind, ElementTree, PatchMode, PatchResult};

/// Revised input returned by a conflict callback: new code and fresh hash
pub type ConflictRevision = (String, String);

/// Callback invoked on a write conflict with
/// `(current_source, current_hash, attempted_new_code)`.
pub type ConflictCallback =
    Box<dyn Fn(&str, &str, &str) -> Option<ConflictRevision> + Send + Sync>;

/// One indexed element occurrence
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub name: String,
    pub kind: ElementKind,
    /// Workspace-relative file path
    pub file: PathBuf,
    /// Shortest path expression addressing the element
    pub path: String,
}

/// Per-file index state with the mtime it was built from
#[derive(Debug, Clone)]
struct FileIndex {
    mtime: Option<SystemTime>,
    entries: Vec<IndexEntry>,
}

/// An indexed directory tree serving cross-file queries and patches
pub struct Workspace {
    root: PathBuf,
    registry: &'static LanguageRegistry,
    parsers: Arc<ParserFacade>,
    index: RwLock<HashMap<PathBuf, FileIndex>>,
    locks: Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>,
    retry: RetryPolicy,
    on_conflict: RwLock<Option<ConflictCallback>>,
}

impl Workspace {
    /// Open and index a directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let workspace = Self {
            root: root.into(),
            registry: registry::global(),
            parsers: Arc::new(ParserFacade::new()),
            index: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            retry: RetryPolicy::default(),
            on_conflict: RwLock::new(None),
        };
        workspace.build_index()?;
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register the conflict callback; at most one retry per apply
    pub fn set_on_conflict(&self, callback: ConflictCallback) {
        *self.on_conflict.write() = Some(callback);
    }

    fn build_index(&self) -> Result<()> {
        let mut files = Vec::new();
        for entry in WalkBuilder::new(&self.root).build() {
            let entry = entry.map_err(|e| CodeHemError::Validation {
                message: format!("cannot walk workspace: {}", e),
            })?;
            let path = entry.path();
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
                && self.registry.get_for_path(path).is_some()
            {
                files.push(path.to_path_buf());
            }
        }

        let indexed: Vec<(PathBuf, FileIndex)> = files
            .par_iter()
            .filter_map(|path| match self.index_file(path) {
                Ok(file_index) => {
                    let relative = path.strip_prefix(&self.root).unwrap_or(path).to_path_buf();
                    Some((relative, file_index))
                }
                Err(err) => {
                    debug!("skipping {}: {}", path.display(), err);
                    None
                }
            })
            .collect();

        let mut index = self.index.write();
        index.clear();
        index.extend(indexed);
        Ok(())
    }

    fn index_file(&self, path: &Path) -> Result<FileIndex> {
        let source = fs::read_to_string(path)?;
        let tree = self.engine_for(path)?.extract(&source)?;
        let relative = path.strip_prefix(&self.root).unwrap_or(path).to_path_buf();
        Ok(FileIndex {
            mtime: file_mtime(path),
            entries: index_entries(&tree, &relative),
        })
    }

    fn engine_for(&self, path: &Path) -> Result<CodeHem> {
        let plugin = self.registry.get_for_path(path).ok_or_else(|| {
            CodeHemError::UnsupportedLanguage {
                language: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            }
        })?;
        Ok(CodeHem::from_plugin(plugin, Arc::clone(&self.parsers)))
    }

    fn file_lock(&self, relative: &Path) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(relative.to_path_buf())
                .or_insert_with(|| Arc::new(RwLock::new(()))),
        )
    }

    /// Re-index files whose on-disk mtime no longer matches the index
    fn refresh_stale(&self) {
        let stale: Vec<PathBuf> = {
            let index = self.index.read();
            index
                .iter()
                .filter(|(file, fi)| file_mtime(&self.root.join(file)) != fi.mtime)
                .map(|(file, _)| file.clone())
                .collect()
        };

        for relative in stale {
            match self.index_file(&self.root.join(&relative)) {
                Ok(file_index) => {
                    self.index.write().insert(relative, file_index);
                }
                Err(err) => {
                    debug!("dropping stale index for {}: {}", relative.display(), err);
                    self.index.write().remove(&relative);
                }
            }
        }
    }

    /// Cross-file element lookup over the (lazily refreshed) index
    pub fn find(
        &self,
        name: Option<&str>,
        kind: Option<ElementKind>,
        file_glob: Option<&str>,
    ) -> Vec<(PathBuf, String)> {
        self.refresh_stale();

        let index = self.index.read();
        let mut results: Vec<(PathBuf, String)> = index
            .iter()
            .flat_map(|(file, fi)| fi.entries.iter().map(move |e| (file, e)))
            .filter(|(file, entry)| {
                name.map_or(true, |n| entry.name == n)
                    && kind.map_or(true, |k| entry.kind == k)
                    && file_glob.map_or(true, |g| glob_match(g, &file.to_string_lossy()))
            })
            .map(|(file, entry)| (file.clone(), entry.path.clone()))
            .collect();
        results.sort();
        results.dedup();
        results
    }

    /// Read a file through the workspace; blocks while a write is in flight
    pub fn read_file(&self, file: impl AsRef<Path>) -> Result<String> {
        let relative = file.as_ref().to_path_buf();
        let lock = self.file_lock(&relative);
        let _guard = lock.read();
        let absolute = self.root.join(&relative);
        self.retry.run(|| Ok(fs::read_to_string(&absolute)?))
    }

    /// Extract the element tree of an indexed file
    pub fn extract_file(&self, file: impl AsRef<Path>) -> Result<ElementTree> {
        let source = self.read_file(&file)?;
        self.engine_for(&self.root.join(file.as_ref()))?.extract(&source)
    }

    /// Apply a patch to a file end-to-end: read, patch, atomic write-back.
    ///
    /// The per-file write lock is held from the hash check through the
    /// rename, so concurrent applies against one file are strictly
    /// serialized and the final state equals some serial order of them.
    pub fn apply_patch(
        &self,
        file: impl AsRef<Path>,
        path: &str,
        new_code: &str,
        mode: PatchMode,
        original_hash: Option<&str>,
        dry_run: bool,
    ) -> Result<PatchResult> {
        let relative = file.as_ref().to_path_buf();
        let absolute = self.root.join(&relative);
        let engine = self.engine_for(&absolute)?;

        let lock = self.file_lock(&relative);
        let _guard = lock.write();

        let source = self.retry.run(|| Ok(fs::read_to_string(&absolute)?))?;

        let mut result = match engine.apply_patch(&source, path, new_code, mode, original_hash, dry_run)
        {
            Err(CodeHemError::WriteConflict {
                path: conflict_path,
                expected,
                actual,
            }) => {
                let callback = self.on_conflict.read();
                let revision = callback
                    .as_ref()
                    .and_then(|cb| cb(&source, &actual, new_code));
                drop(callback);
                match revision {
                    Some((revised_code, fresh_hash)) => engine.apply_patch(
                        &source,
                        path,
                        &revised_code,
                        mode,
                        Some(&fresh_hash),
                        dry_run,
                    )?,
                    None => {
                        return Err(CodeHemError::WriteConflict {
                            path: conflict_path,
                            expected,
                            actual,
                        })
                    }
                }
            }
            other => other?,
        };

        if dry_run {
            // File writes never return the buffer on dry runs
            result.modified_code = None;
            return Ok(result);
        }

        let modified = result.modified_code.clone().ok_or_else(|| {
            CodeHemError::Validation {
                message: "patch produced no buffer".to_string(),
            }
        })?;
        self.retry
            .run(|| atomic_write(&absolute, modified.as_bytes()))?;

        // Refresh this file's index entries from the new content
        let tree = engine.extract(&modified)?;
        self.index.write().insert(
            relative.clone(),
            FileIndex {
                mtime: file_mtime(&absolute),
                entries: index_entries(&tree, &relative),
            },
        );

        Ok(result)
    }

    /// Add-or-replace an element end-to-end: replace when `path` resolves,
    /// otherwise append to the enclosing container. Same locking and
    /// write-back behavior as [`Workspace::apply_patch`].
    pub fn upsert_by_path(
        &self,
        file: impl AsRef<Path>,
        path: &str,
        new_code: &str,
    ) -> Result<PatchResult> {
        let relative = file.as_ref().to_path_buf();
        let absolute = self.root.join(&relative);
        let engine = self.engine_for(&absolute)?;

        let lock = self.file_lock(&relative);
        let _guard = lock.write();

        let source = self.retry.run(|| Ok(fs::read_to_string(&absolute)?))?;
        let result = engine.upsert_by_path(&source, path, new_code)?;

        let modified = result.modified_code.clone().ok_or_else(|| {
            CodeHemError::Validation {
                message: "patch produced no buffer".to_string(),
            }
        })?;
        self.retry
            .run(|| atomic_write(&absolute, modified.as_bytes()))?;

        let tree = engine.extract(&modified)?;
        self.index.write().insert(
            relative.clone(),
            FileIndex {
                mtime: file_mtime(&absolute),
                entries: index_entries(&tree, &relative),
            },
        );

        Ok(result)
    }

    /// Drop the index; the workspace is unusable afterwards
    pub fn close(self) {}
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Write via a temporary sibling, then rename into place
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("buffer");
    let temp_path = path.with_file_name(format!(".{}.codehem-tmp", file_name));
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Index entries for every addressable element of a tree
fn index_entries(tree: &ElementTree, file: &Path) -> Vec<IndexEntry> {
    let mut entries = Vec::new();

    fn visit(element: &Element, prefix: &str, file: &Path, entries: &mut Vec<IndexEntry>) {
        let addressable = !matches!(
            element.kind,
            ElementKind::Parameter | ElementKind::ReturnValue | ElementKind::Decorator
        );
        if !addressable {
            return;
        }

        let path = if element.kind == ElementKind::Import {
            "imports".to_string()
        } else if prefix.is_empty() {
            element.name.clone()
        } else {
            format!("{}.{}", prefix, element.name)
        };

        entries.push(IndexEntry {
            name: element.name.clone(),
            kind: element.kind,
            file: file.to_path_buf(),
            path: path.clone(),
        });

        for child in &element.children {
            visit(child, &path, file, entries);
        }
    }

    for element in &tree.elements {
        visit(element, "", file, &mut entries);
    }
    entries
}

/// Minimal `*`/`?` wildcard matching for file filters. Unlike shell globs,
/// `*` also matches path separators, so `*.py` matches `src/models.py`.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn matches(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                matches(&p[1..], t) || (!t.is_empty() && matches(p, &t[1..]))
            }
            (Some(b'?'), Some(_)) => matches(&p[1..], &t[1..]),
            (Some(a), Some(b)) if a == b => matches(&p[1..], &t[1..]),
            _ => false,
        }
    }
    matches(pattern.as_bytes(), text.as_bytes())
}
