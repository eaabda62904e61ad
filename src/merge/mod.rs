//! The duplicate merger.
//!
//! # Overview
//!
//! Core orchestration of a run: workers hand every discovered file to
//! [`Merger::handle_file`], which files it into the size index and decides
//! what to do with it. All decisions about files of one size happen inside
//! that size's bucket lock; buckets are independent, so no cross-bucket
//! ordering exists or is needed.
//!
//! Per file, in order:
//! 1. count it; drop it if outside the size bounds,
//! 2. file it into its size bucket,
//! 3. files that already are hard links go to the hard-link handler,
//! 4. symbolic links go to the symlink handler,
//! 5. everything else is compared against its bucket peers and, on the
//!    first verified match, replaced with a link by the
//!    [`replace`] transaction.
//!
//! No failure in here ends the run; every error path logs and moves on to
//! the next file.

pub mod replace;
pub mod restore;

use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use replace::{LinkKind, ReplaceError};
pub use restore::RestoreError;

use crate::compare::BufferPool;
use crate::config::Configuration;
use crate::fsys::{self, attrs, LinkRegistry};
use crate::index::{SeenIndex, SizeBucket};
use crate::scanner;
use crate::stats::RuntimeStats;

/// Orchestrates one deduplication run.
#[derive(Debug)]
pub struct Merger {
    config: Configuration,
    stats: RuntimeStats,
    index: SeenIndex,
    links: LinkRegistry,
    shutdown: Option<Arc<AtomicBool>>,
}

impl Merger {
    #[must_use]
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            stats: RuntimeStats::new(),
            index: SeenIndex::new(),
            links: LinkRegistry::new(),
            shutdown: None,
        }
    }

    /// Attach a shutdown flag; workers drain once it turns true.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// The counters of this run.
    #[must_use]
    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    /// Walk `roots` and resolve duplicates. Blocks until done.
    pub fn run(&self, roots: &[PathBuf]) {
        if let Some(first) = roots.first() {
            BufferPool::init_for(first);
        }
        scanner::crawl(
            roots.to_vec(),
            self.config.max_crawler_threads,
            self.shutdown.as_deref(),
            &self.stats,
            |path, metadata| self.handle_file(&path, &metadata),
        );
    }

    /// Decide and execute the action for one discovered file.
    ///
    /// `metadata` comes from `symlink_metadata`: symlinks are described as
    /// themselves, not as their targets.
    pub fn handle_file(&self, path: &Path, metadata: &Metadata) {
        let size = metadata.len();
        self.stats.add_file(size);
        if !self.config.size_in_bounds(size) {
            log::trace!("size {} out of bounds: {}", size, path.display());
            return;
        }

        let bucket = self.index.bucket_for(size);
        let _guard = bucket.lock();
        let entry = bucket.insert(path);

        let link_info = match self.links.link_targets(path, metadata) {
            Ok(info) => info,
            Err(e) => {
                bucket.remove(path);
                log::warn!("hard-link query failed for {}: {}", path.display(), e);
                return;
            }
        };
        for sibling in &link_info.siblings {
            let _ = bucket.insert(sibling);
        }

        if link_info.is_linked {
            self.stats.hard.add_seen();
            if self.config.show_info_only {
                return;
            }
            self.handle_existing_hard_link(&bucket, path);
            return;
        }

        let symlink_target = match fsys::read_symlink_target(path) {
            Ok(target) => target,
            Err(e) => {
                bucket.remove(path);
                log::warn!("symlink query failed for {}: {}", path.display(), e);
                return;
            }
        };
        if let Some(target) = symlink_target {
            let _ = bucket.insert(&target);
            self.stats.symbolic.add_seen();
            if self.config.show_info_only {
                return;
            }
            self.handle_existing_symbolic_link(&bucket, path);
            return;
        }

        if self.config.show_info_only {
            return;
        }

        for twin in bucket.others(path) {
            if !entry.content_equals(&twin) {
                continue;
            }
            match replace::replace_with_link(path, twin.path(), &self.config) {
                Ok(LinkKind::Hard) => {
                    self.stats.hard.add_created();
                    log::info!("{} => hard link to {}", path.display(), twin.path().display());
                    return;
                }
                Ok(LinkKind::Symbolic) => {
                    self.stats.symbolic.add_created();
                    log::info!("{} => symlink to {}", path.display(), twin.path().display());
                    return;
                }
                Err(e) => {
                    // Next twin candidate may live on a linkable spot.
                    log::warn!("{}", e);
                }
            }
        }
    }

    /// A file that already is a hard link.
    fn handle_existing_hard_link(&self, bucket: &SizeBucket, path: &Path) {
        if self.config.delete_hardlinks {
            bucket.remove(path);
            attrs::prepare_for_delete(path);
            match fs::remove_file(path) {
                Ok(()) => {
                    self.stats.hard.add_deleted();
                    log::info!("deleted hard link {}", path.display());
                }
                Err(e) => log::warn!("cannot delete {}: {}", path.display(), e),
            }
        } else if self.config.remove_hardlinks {
            bucket.remove(path);
            match restore::materialize_back(path) {
                Ok(()) => {
                    self.stats.hard.add_removed();
                    log::info!("materialized hard link {}", path.display());
                }
                Err(e) => log::warn!("{}", e),
            }
        } else if self.config.set_readonly_on_existing_hard {
            self.set_readonly_if_clear(path);
        } else {
            log::debug!("{} is already a hard link", path.display());
        }
    }

    /// A file that is a symbolic link; mirrors the hard-link policy.
    fn handle_existing_symbolic_link(&self, bucket: &SizeBucket, path: &Path) {
        if self.config.delete_symlinks {
            bucket.remove(path);
            attrs::prepare_for_delete(path);
            match fs::remove_file(path) {
                Ok(()) => {
                    self.stats.symbolic.add_deleted();
                    log::info!("deleted symlink {}", path.display());
                }
                Err(e) => log::warn!("cannot delete {}: {}", path.display(), e),
            }
        } else if self.config.remove_symlinks {
            bucket.remove(path);
            match restore::materialize_back(path) {
                Ok(()) => {
                    self.stats.symbolic.add_removed();
                    log::info!("materialized symlink {}", path.display());
                }
                Err(e) => log::warn!("{}", e),
            }
        } else if self.config.set_readonly_on_existing_sym {
            self.set_readonly_if_clear(path);
        } else {
            log::debug!("{} is already a symlink", path.display());
        }
    }

    fn set_readonly_if_clear(&self, path: &Path) {
        match attrs::is_readonly(path) {
            Ok(false) => {
                if let Err(e) = attrs::set_readonly(path, true) {
                    log::warn!("cannot set readonly on {}: {}", path.display(), e);
                }
            }
            Ok(true) => {}
            Err(e) => log::warn!("cannot inspect {}: {}", path.display(), e),
        }
    }
}
