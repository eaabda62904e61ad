//! Parallel directory crawler.
//!
//! # Overview
//!
//! A pool of OS worker threads drains a shared [`WorkStack`] of pending
//! directories. Each popped directory is enumerated once: subdirectories
//! go back onto the stack (waking a sleeping peer per push), files are
//! handed to the per-file callback. Per-entry errors are logged and
//! skipped; a directory that cannot be enumerated at all is skipped as a
//! whole. No error stops the run.
//!
//! Symbolic links are never followed during traversal. A symlink, even one
//! pointing at a directory, is reported to the callback as a file; the
//! merge pipeline decides what to do with it.

pub mod stack;

use std::fs::{self, Metadata};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

pub use stack::WorkStack;

use crate::stats::RuntimeStats;

/// Walk `roots` with `threads` workers, invoking `on_file` for every
/// file-like entry (regular file or symlink) found.
///
/// Blocks until every directory has been visited and all callbacks have
/// returned. When `shutdown` becomes true, workers stop between files,
/// abandon the rest of their directory, and drain the remaining
/// directories without processing them so the termination protocol still
/// completes.
pub fn crawl<F>(
    roots: Vec<PathBuf>,
    threads: usize,
    shutdown: Option<&AtomicBool>,
    stats: &RuntimeStats,
    on_file: F,
) where
    F: Fn(PathBuf, Metadata) + Sync,
{
    let threads = threads.max(1);
    let stack = WorkStack::new(threads);
    for root in roots {
        stack.push(root);
    }

    thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| worker(&stack, shutdown, stats, &on_file));
        }
    });
}

fn worker<F>(stack: &WorkStack, shutdown: Option<&AtomicBool>, stats: &RuntimeStats, on_file: &F)
where
    F: Fn(PathBuf, Metadata) + Sync,
{
    let shutdown_requested = || shutdown.is_some_and(|flag| flag.load(Ordering::SeqCst));

    while let Some(dir) = stack.pop_or_wait() {
        if shutdown_requested() {
            log::debug!("shutdown requested, skipping {}", dir.display());
            continue;
        }

        stats.add_folder();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("cannot enumerate {}: {}", dir.display(), e);
                continue;
            }
        };

        for entry in entries {
            // Re-check between files: a single directory can hold
            // thousands of them, each potentially a full comparison and
            // link transaction.
            if shutdown_requested() {
                log::debug!("shutdown requested, abandoning {}", dir.display());
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("bad entry under {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            let metadata = match fs::symlink_metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    log::warn!("cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };

            if metadata.is_dir() {
                stack.push(path);
            } else {
                on_file(path, metadata);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &[u8]) {
        File::create(path).unwrap().write_all(content).unwrap();
    }

    fn build_tree(levels: usize, files_per_dir: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        let mut frontier = vec![dir.path().to_path_buf()];
        for level in 0..levels {
            let mut next = Vec::new();
            for parent in &frontier {
                for i in 0..files_per_dir {
                    write_file(&parent.join(format!("f{level}_{i}.txt")), b"content");
                }
                for i in 0..2 {
                    let sub = parent.join(format!("d{level}_{i}"));
                    fs::create_dir(&sub).unwrap();
                    next.push(sub);
                }
            }
            frontier = next;
        }
        dir
    }

    #[test]
    fn test_crawl_visits_every_file_once() {
        let tree = build_tree(3, 2);
        let stats = RuntimeStats::new();
        let seen = Mutex::new(Vec::new());

        crawl(
            vec![tree.path().to_path_buf()],
            4,
            None,
            &stats,
            |path, _meta| seen.lock().push(path),
        );

        let seen = seen.into_inner();
        // 1 + 2 + 4 dirs carry files (the leaf dirs are empty), 2 files each.
        assert_eq!(seen.len(), 14);
        let unique: HashSet<_> = seen.iter().collect();
        assert_eq!(unique.len(), seen.len(), "no file may be visited twice");
    }

    #[test]
    fn test_crawl_counts_folders() {
        let tree = build_tree(2, 1);
        let stats = RuntimeStats::new();

        crawl(vec![tree.path().to_path_buf()], 2, None, &stats, |_, _| {});

        // Root, 2 children, 4 grandchildren.
        assert_eq!(stats.folders(), 7);
    }

    #[test]
    fn test_crawl_tolerates_missing_root() {
        let stats = RuntimeStats::new();
        // Must terminate and not panic.
        crawl(
            vec![PathBuf::from("/nonexistent/path/12345")],
            2,
            None,
            &stats,
            |_, _| {},
        );
        assert_eq!(stats.folders(), 1);
    }

    #[test]
    #[cfg(unix)]
    fn test_crawl_reports_symlinks_as_files() {
        let tree = TempDir::new().unwrap();
        write_file(&tree.path().join("real.txt"), b"content");
        std::os::unix::fs::symlink("real.txt", tree.path().join("link.txt")).unwrap();

        let stats = RuntimeStats::new();
        let symlinks = Mutex::new(Vec::new());
        crawl(
            vec![tree.path().to_path_buf()],
            1,
            None,
            &stats,
            |path, meta| {
                if meta.file_type().is_symlink() {
                    symlinks.lock().push(path);
                }
            },
        );

        assert_eq!(symlinks.into_inner().len(), 1);
    }

    #[test]
    fn test_crawl_honors_shutdown_flag() {
        let tree = build_tree(3, 3);
        let stats = RuntimeStats::new();
        let flag = AtomicBool::new(true);
        let seen = Mutex::new(0usize);

        crawl(
            vec![tree.path().to_path_buf()],
            2,
            Some(&flag),
            &stats,
            |_, _| *seen.lock() += 1,
        );

        assert_eq!(*seen.lock(), 0, "pre-set flag must suppress all work");
    }

    #[test]
    fn test_shutdown_mid_directory_stops_between_files() {
        // One flat directory with many files; the callback raises the
        // flag on the first file it sees.
        let tree = TempDir::new().unwrap();
        for i in 0..50 {
            write_file(&tree.path().join(format!("f{i}.txt")), b"content");
        }

        let stats = RuntimeStats::new();
        let flag = AtomicBool::new(false);
        let seen = Mutex::new(0usize);

        crawl(
            vec![tree.path().to_path_buf()],
            1,
            Some(&flag),
            &stats,
            |_, _| {
                *seen.lock() += 1;
                flag.store(true, Ordering::SeqCst);
            },
        );

        assert_eq!(
            *seen.lock(),
            1,
            "the rest of the directory must be abandoned once the flag is up"
        );
    }
}
