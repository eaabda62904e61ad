//! The in-memory index of seen files.
//!
//! # Overview
//!
//! [`SeenIndex`] maps every observed file size to a [`SizeBucket`]; the
//! bucket holds the [`FileEntry`] descriptors of all files of that size.
//! Buckets are created on demand and live until the end of the run.
//!
//! # Locking discipline
//!
//! The outer map is lock-free for insertion (a racing bucket creation has
//! at most one winner). Entry insertion inside a bucket is concurrent too,
//! but *all decision-making on a bucket happens under its gate*: two
//! workers each concluding that the other's file is "the duplicate" could
//! otherwise delete both surviving copies. Files of identical size are a
//! small minority, so serializing per size costs little parallelism.

pub mod entry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};

pub use entry::{FileEntry, SHORT_DIGEST_THRESHOLD};

/// All seen files of one particular byte length.
#[derive(Debug)]
pub struct SizeBucket {
    size: u64,
    /// Serializes every decision about files of this size.
    gate: Mutex<()>,
    entries: DashMap<PathBuf, Arc<FileEntry>>,
}

impl SizeBucket {
    fn new(size: u64) -> Self {
        Self {
            size,
            gate: Mutex::new(()),
            entries: DashMap::new(),
        }
    }

    /// The byte length all entries in this bucket share.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Enter the bucket's critical section.
    #[must_use]
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock()
    }

    /// Insert an entry for `path`, or return the existing one.
    #[must_use]
    pub fn insert(&self, path: &Path) -> Arc<FileEntry> {
        self.entries
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(FileEntry::new(path.to_path_buf(), self.size)))
            .value()
            .clone()
    }

    /// Remove the entry for `path`, if present.
    pub fn remove(&self, path: &Path) {
        self.entries.remove(path);
    }

    /// Snapshot of all entries except the one for `path`.
    #[must_use]
    pub fn others(&self, path: &Path) -> Vec<Arc<FileEntry>> {
        self.entries
            .iter()
            .filter(|kv| kv.key().as_path() != path)
            .map(|kv| kv.value().clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Concurrent map from file size to its bucket.
#[derive(Debug, Default)]
pub struct SeenIndex {
    buckets: DashMap<u64, Arc<SizeBucket>>,
}

impl SeenIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The bucket for `size`, created on first use.
    #[must_use]
    pub fn bucket_for(&self, size: u64) -> Arc<SizeBucket> {
        self.buckets
            .entry(size)
            .or_insert_with(|| Arc::new(SizeBucket::new(size)))
            .value()
            .clone()
    }

    /// Number of distinct sizes observed.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
