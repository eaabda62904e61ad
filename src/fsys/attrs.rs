//! File attribute bits.
//!
//! The engine touches attributes in three places: clearing protective bits
//! before deleting a file, setting the readonly bit on freshly created
//! links, and restoring an attribute subset after materializing a link
//! back into a real file.
//!
//! # Platform Support
//!
//! On Unix the only attribute with a counterpart is readonly (the owner
//! write bit). Hidden/system/archive and the sparse/compressed/encrypted
//! NTFS bits have no equivalent; propagation of those is a documented
//! no-op here and becomes real work only on filesystems that carry them.

use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

/// Whether the path's readonly bit is set.
pub fn is_readonly(path: &Path) -> io::Result<bool> {
    Ok(fs::metadata(path)?.permissions().readonly())
}

/// Set or clear the readonly bit.
#[cfg(unix)]
pub fn set_readonly(path: &Path, readonly: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = fs::metadata(path)?;
    let mut permissions = metadata.permissions();
    let mode = permissions.mode();
    let new_mode = if readonly {
        mode & !0o222
    } else {
        // Only the owner write bit; group/world stay as they were.
        mode | 0o200
    };
    if new_mode == mode {
        return Ok(());
    }
    permissions.set_mode(new_mode);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
pub fn set_readonly(path: &Path, readonly: bool) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(readonly);
    fs::set_permissions(path, permissions)
}

/// Best-effort clear of the bits that would block a deletion
/// (readonly; on other platforms also hidden/system).
///
/// Errors are logged and swallowed: the deletion that follows will
/// surface any real problem. Symlinks are left alone; their permission
/// bits never gate deletion, and chmod would reach through to the target.
pub fn prepare_for_delete(path: &Path) {
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.file_type().is_symlink() {
            return;
        }
    }
    if let Err(e) = set_readonly(path, false) {
        log::trace!(
            "could not clear protective attributes on {}: {}",
            path.display(),
            e
        );
    }
}

/// Propagate the sparse/compressed/encrypted bits of `source` onto `dest`.
///
/// Sparse and compressed propagation is best-effort (failures are logged
/// and tolerated). Encryption, when the source carries it, must succeed;
/// a failure is returned to the caller.
pub fn propagate_special(source: &Metadata, dest: &Path) -> io::Result<()> {
    // No Unix filesystem in scope exposes these as per-file attribute
    // bits: sparse extents appear on their own, and compression or
    // encryption is a mount property. Nothing to carry over.
    let _ = (source, dest);
    Ok(())
}

/// Restore the preservable attribute subset of `source` onto `dest`
/// (readonly and mode bits; archive/hidden/system where they exist).
pub fn restore_subset(source: &Metadata, dest: &Path) -> io::Result<()> {
    fs::set_permissions(dest, source.permissions())
}
