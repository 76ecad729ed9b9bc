//! Host hook that maps import paths to module ids and fetches sources.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("cannot resolve `{path}` from `{from}`")]
    Unresolved { path: String, from: String },
    #[error("no source for module `{id}`")]
    NotFound { id: String },
    #[error("failed to load `{id}`: {message}")]
    Io { id: String, message: String },
}

/// Supplied by the host to resolve and load imported modules.
///
/// `resolve` must be pure: the same path from the same module always names
/// the same id. `load_source` may block on I/O.
pub trait Linker: Send + Sync {
    fn resolve(&self, path: &str, from_id: &str) -> Result<String, LinkError>;

    fn load_source(&self, id: &str) -> Result<String, LinkError>;
}

/// A linker over an in-memory table of sources.
///
/// Paths resolve to ids verbatim, minus a leading `./`.
#[derive(Default)]
pub struct MemoryLinker {
    sources: RwLock<FxHashMap<String, String>>,
    loads: AtomicUsize,
}

impl MemoryLinker {
    pub fn new() -> Self {
        MemoryLinker::default()
    }

    #[must_use]
    pub fn with_module(self, id: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(id, source);
        self
    }

    pub fn insert(&self, id: impl Into<String>, source: impl Into<String>) {
        self.sources.write().insert(id.into(), source.into());
    }

    /// Number of successful `load_source` calls so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl Linker for MemoryLinker {
    fn resolve(&self, path: &str, from_id: &str) -> Result<String, LinkError> {
        let id = path.strip_prefix("./").unwrap_or(path);
        if id.is_empty() {
            return Err(LinkError::Unresolved {
                path: path.to_string(),
                from: from_id.to_string(),
            });
        }
        Ok(id.to_string())
    }

    fn load_source(&self, id: &str) -> Result<String, LinkError> {
        let source = self
            .sources
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| LinkError::NotFound { id: id.to_string() })?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(source)
    }
}
