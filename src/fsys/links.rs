//! Hard-link identity tracking.
//!
//! Hard links are directory entries sharing one inode. The engine needs to
//! know, for each file it meets, whether other names for the same inode
//! exist, and which of those names the current run has already seen.
//!
//! # Platform Support
//!
//! - **Unix**: `(device, inode)` pairs from metadata; the link count
//!   (`nlink`) tells whether siblings exist at all. There is no syscall
//!   that enumerates sibling paths, so only paths visited by this run can
//!   be named.
//! - **Other**: identity tracking disabled; every file reports as
//!   un-linked.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use dashmap::DashMap;

/// Platform-specific inode identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeKey {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    _unsupported: (),
}

impl InodeKey {
    /// Derive the inode identity from file metadata.
    ///
    /// Returns `None` where the platform does not expose one.
    #[cfg(unix)]
    #[must_use]
    pub fn of(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn of(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

#[cfg(unix)]
fn link_count(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.nlink()
}

#[cfg(not(unix))]
fn link_count(_metadata: &Metadata) -> u64 {
    1
}

/// What the hard-link query learned about one path.
#[derive(Debug, Clone, Default)]
pub struct HardLinkInfo {
    /// Other names for the same inode exist (whether or not this run has
    /// visited them).
    pub is_linked: bool,
    /// Sibling paths of the same inode that this run has already visited.
    pub siblings: Vec<PathBuf>,
}

/// Concurrent registry of every inode visited by the current run.
///
/// Workers record each file as they meet it; the registry answers the
/// "other hard-link targets" query of the merge pipeline.
#[derive(Debug, Default)]
pub struct LinkRegistry {
    seen: DashMap<InodeKey, Vec<PathBuf>>,
}

impl LinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` and report the hard-link state of its inode.
    ///
    /// `is_linked` comes from the inode's link count; `siblings` names the
    /// already-visited paths sharing the inode (excluding `path` itself).
    /// Recorded names that stopped sharing the inode since they were seen
    /// (deleted or materialized meanwhile) are dropped, never reported.
    pub fn link_targets(&self, path: &Path, metadata: &Metadata) -> std::io::Result<HardLinkInfo> {
        let Some(key) = InodeKey::of(metadata) else {
            return Ok(HardLinkInfo::default());
        };

        let mut paths = self.seen.entry(key).or_default();
        paths.retain(|p| {
            p.as_path() == path
                || std::fs::symlink_metadata(p)
                    .ok()
                    .and_then(|m| InodeKey::of(&m))
                    .is_some_and(|k| k == key)
        });
        let siblings: Vec<PathBuf> = paths
            .iter()
            .filter(|p| p.as_path() != path)
            .cloned()
            .collect();
        if !paths.iter().any(|p| p.as_path() == path) {
            paths.push(path.to_path_buf());
        }

        Ok(HardLinkInfo {
            is_linked: link_count(metadata) > 1,
            siblings,
        })
    }

    /// Number of distinct inodes recorded.
    #[must_use]
    pub fn inode_count(&self) -> usize {
        self.seen.len()
    }
}
