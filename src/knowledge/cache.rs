//! Advisory existence cache for per-user collections.
//!
//! Entries live in memory and, when a cache directory is configured, in a
//! one-line `{collection}.cache` file so a restart keeps the hint. The cache
//! never decides absence: a miss always falls through to the backend.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dashmap::DashSet;
use tracing::{debug, warn};

/// Collection-name keyed existence hints.
#[derive(Debug, Default)]
pub struct ExistenceCache {
    known: DashSet<String>,
    dir: Option<PathBuf>,
}

impl ExistenceCache {
    /// In-memory only cache.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Cache mirrored to one file per collection under `dir`.
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            known: DashSet::new(),
            dir: Some(dir.into()),
        }
    }

    /// Build from an optional directory.
    #[must_use]
    pub fn new(dir: Option<&Path>) -> Self {
        dir.map_or_else(Self::in_memory, Self::with_dir)
    }

    /// Whether `collection` is recorded as existing.
    #[must_use]
    pub fn contains(&self, collection: &str) -> bool {
        if self.known.contains(collection) {
            debug!(collection, "existence cache hit");
            return true;
        }
        let Some(path) = self.file_for(collection) else {
            return false;
        };
        match fs::read_to_string(&path) {
            Ok(line) if line.trim() == collection => {
                debug!(collection, "existence cache hit (file)");
                self.known.insert(collection.to_string());
                true
            }
            _ => false,
        }
    }

    /// Record that `collection` exists.
    pub fn mark(&self, collection: &str) {
        self.known.insert(collection.to_string());
        let Some(path) = self.file_for(collection) else {
            return;
        };
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&path, format!("{collection}\n")));
        if let Err(err) = written {
            warn!(collection, error = %err, "failed to write existence cache file");
        }
    }

    /// Forget `collection`.
    pub fn clear(&self, collection: &str) {
        self.known.remove(collection);
        let Some(path) = self.file_for(collection) else {
            return;
        };
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(collection, error = %err, "failed to remove existence cache file");
            }
        }
    }

    fn file_for(&self, collection: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{collection}.cache")))
    }
}
