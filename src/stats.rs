//! Run-wide counters.
//!
//! All mutators are lock-free atomic additions; totals are eventually
//! consistent while workers run and exact once the crawl has joined.

use std::sync::atomic::{AtomicU64, Ordering};

use bytesize::ByteSize;

/// Counters for one link kind (hard or symbolic).
#[derive(Debug, Default)]
pub struct LinkStats {
    seen: AtomicU64,
    created: AtomicU64,
    deleted: AtomicU64,
    removed: AtomicU64,
}

impl LinkStats {
    pub fn add_seen(&self) {
        self.seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }
}

/// All counters of one run.
#[derive(Debug, Default)]
pub struct RuntimeStats {
    files: AtomicU64,
    folders: AtomicU64,
    bytes: AtomicU64,
    /// Hard-link counters.
    pub hard: LinkStats,
    /// Symbolic-link counters.
    pub symbolic: LinkStats,
}

impl RuntimeStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one visited file of `bytes` length.
    pub fn add_file(&self, bytes: u64) {
        self.files.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record one visited folder.
    pub fn add_folder(&self) {
        self.folders.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn files(&self) -> u64 {
        self.files.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn folders(&self) -> u64 {
        self.folders.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Human-readable end-of-run summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} files in {} folders ({})\n\
             hard links: {} seen, {} created, {} deleted, {} removed\n\
             symlinks:   {} seen, {} created, {} deleted, {} removed",
            self.files(),
            self.folders(),
            ByteSize::b(self.bytes()),
            self.hard.seen(),
            self.hard.created(),
            self.hard.deleted(),
            self.hard.removed(),
            self.symbolic.seen(),
            self.symbolic.created(),
            self.symbolic.deleted(),
            self.symbolic.removed(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = RuntimeStats::new();
        assert_eq!(stats.files(), 0);
        assert_eq!(stats.folders(), 0);
        assert_eq!(stats.bytes(), 0);
        assert_eq!(stats.hard.seen(), 0);
        assert_eq!(stats.symbolic.created(), 0);
    }

    #[test]
    fn test_add_file_accumulates_bytes() {
        let stats = RuntimeStats::new();
        stats.add_file(100);
        stats.add_file(250);
        assert_eq!(stats.files(), 2);
        assert_eq!(stats.bytes(), 350);
    }

    #[test]
    fn test_concurrent_additions_are_exact() {
        let stats = Arc::new(RuntimeStats::new());
        thread::scope(|scope| {
            for _ in 0..8 {
                let stats = Arc::clone(&stats);
                scope.spawn(move || {
                    for _ in 0..1000 {
                        stats.add_file(3);
                        stats.hard.add_seen();
                    }
                });
            }
        });
        assert_eq!(stats.files(), 8000);
        assert_eq!(stats.bytes(), 24_000);
        assert_eq!(stats.hard.seen(), 8000);
    }

    #[test]
    fn test_summary_mentions_totals() {
        let stats = RuntimeStats::new();
        stats.add_file(1024);
        stats.add_folder();
        stats.hard.add_created();

        let summary = stats.summary();
        assert!(summary.contains("1 files"));
        assert!(summary.contains("1 folders"));
        assert!(summary.contains("1 created"));
    }
}
