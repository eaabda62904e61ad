//! Low-level filesystem primitives.
//!
//! Everything the engine needs from the host filesystem: link creation,
//! symlink inspection, hard-link identity ([`links`]), attribute bits
//! ([`attrs`]), positioned reads, temporary-name reservation, and the
//! cluster-geometry query behind the buffer pool's block size.

pub mod attrs;
pub mod links;

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

pub use links::{HardLinkInfo, InodeKey, LinkRegistry};

/// Suffix appended (repeatedly, on collision) to reserve temporary names.
pub const TEMP_SUFFIX: &str = ".$$$";

/// Create a hard link at `at` pointing to the inode of `target`.
pub fn create_hard_link(target: &Path, at: &Path) -> io::Result<()> {
    fs::hard_link(target, at)
}

/// Create a symbolic link at `at` whose target text is `target`.
#[cfg(unix)]
pub fn create_symbolic_link(target: &Path, at: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, at)
}

#[cfg(windows)]
pub fn create_symbolic_link(target: &Path, at: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, at)
}

/// Read the target of a symbolic link.
///
/// Returns `Ok(None)` when `path` is not a symlink. Relative targets are
/// resolved against the link's parent directory.
pub fn read_symlink_target(path: &Path) -> io::Result<Option<PathBuf>> {
    if !fs::symlink_metadata(path)?.file_type().is_symlink() {
        return Ok(None);
    }
    let target = fs::read_link(path)?;
    if target.is_absolute() {
        return Ok(Some(target));
    }
    let resolved = match path.parent() {
        Some(parent) => parent.join(target),
        None => target,
    };
    Ok(Some(resolved))
}

/// Reserve a temporary name next to `target`.
///
/// Appends [`TEMP_SUFFIX`] (again on every collision, including a race
/// that surfaces as `AlreadyExists`) until a name is free, then deletes
/// the probe file: only the name was needed.
pub fn reserve_temp_name(target: &Path) -> io::Result<PathBuf> {
    let mut name: OsString = target.as_os_str().to_os_string();
    loop {
        name.push(TEMP_SUFFIX);
        let candidate = PathBuf::from(&name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(probe) => {
                drop(probe);
                fs::remove_file(&candidate)?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Fill `buf` from `file` starting at byte `offset`.
///
/// Loops over short reads; errors with `UnexpectedEof` if the file ends
/// before `buf` is full (the file changed under us).
pub fn read_full_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.read_exact_at(buf, offset)
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;
        let mut filled = 0usize;
        while filled < buf.len() {
            match file.seek_read(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => {
                    return Err(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "file shrank during comparison",
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Cluster size in bytes of the filesystem holding `path`, if the
/// platform exposes one.
#[cfg(unix)]
pub fn cluster_size(path: &Path) -> Option<usize> {
    use std::os::unix::fs::MetadataExt;
    let blksize = fs::metadata(path).ok()?.blksize();
    usize::try_from(blksize).ok().filter(|&b| b > 0)
}

#[cfg(not(unix))]
pub fn cluster_size(_path: &Path) -> Option<usize> {
    None
}
