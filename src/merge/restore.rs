//! Materialize a link back into an independent file.
//!
//! # Overview
//!
//! The inverse of deduplication: the content a link resolves to is copied
//! into a reserved temporary, the link is deleted, and the copy is renamed
//! into its place. A monotonic state tracks how far the transaction got so
//! the drop guard can run exactly the right compensation:
//!
//! | state at failure | compensation |
//! |---|---|
//! | `NotStarted` / `Done` | nothing |
//! | `Copying` / `Deleting` | delete the temporary |
//! | `Renaming` | move the temporary back into place |
//! | `Attributing` | log and continue (content is safe) |
//!
//! Attribute restoration failures are deliberately swallowed: a file with
//! a mis-set readonly bit is preferable to a failed restore of its bytes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::fsys::{self, attrs};

/// Error type for materialize-back.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// The link's metadata or target could not be read.
    #[error("cannot inspect {path}: {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No temporary name could be reserved.
    #[error("cannot reserve temporary name for {path}: {source}")]
    Reserve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The content could not be copied into the temporary.
    #[error("cannot copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The link itself could not be deleted.
    #[error("cannot delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The copy could not be renamed into place (the original bytes were
    /// moved back best-effort).
    #[error("cannot rename temporary into {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How far the transaction has progressed; advances monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestoreState {
    NotStarted,
    Copying,
    Deleting,
    Renaming,
    Attributing,
    Done,
}

/// Drop guard running the state-specific compensation.
struct Compensation<'a> {
    state: RestoreState,
    temp: &'a Path,
    original: &'a Path,
}

impl Drop for Compensation<'_> {
    fn drop(&mut self) {
        match self.state {
            RestoreState::NotStarted | RestoreState::Done => {}
            RestoreState::Copying | RestoreState::Deleting => {
                attrs::prepare_for_delete(self.temp);
                if let Err(e) = fs::remove_file(self.temp) {
                    if e.kind() != io::ErrorKind::NotFound {
                        log::warn!("cannot remove temporary {}: {}", self.temp.display(), e);
                    }
                }
            }
            RestoreState::Renaming => {
                // The original is already gone; bring the copy back under
                // its name.
                if let Err(e) = fs::rename(self.temp, self.original) {
                    log::error!(
                        "cannot move {} back to {}: {}",
                        self.temp.display(),
                        self.original.display(),
                        e
                    );
                }
            }
            RestoreState::Attributing => {
                log::debug!(
                    "attributes of {} may be partially applied",
                    self.original.display()
                );
            }
        }
    }
}

#[cfg(test)]
thread_local! {
    /// Injects one rename failure into the next restore (crash testing).
    static FAIL_RENAME: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

fn rename_step(temp: &Path, original: &Path) -> io::Result<()> {
    #[cfg(test)]
    if FAIL_RENAME.with(std::cell::Cell::take) {
        return Err(io::Error::other("injected rename failure"));
    }
    fs::rename(temp, original)
}

/// Replace the link at `path` with an independent copy of the content it
/// resolves to.
pub fn materialize_back(path: &Path) -> Result<(), RestoreError> {
    // Resolved metadata: the content's attributes, which the restored
    // file should end up carrying.
    let original_meta = fs::metadata(path).map_err(|source| RestoreError::Inspect {
        path: path.to_path_buf(),
        source,
    })?;

    let temp = fsys::reserve_temp_name(path).map_err(|source| RestoreError::Reserve {
        path: path.to_path_buf(),
        source,
    })?;

    let mut guard = Compensation {
        state: RestoreState::Copying,
        temp: &temp,
        original: path,
    };

    if let Err(e) = attrs::propagate_special(&original_meta, &temp) {
        return Err(RestoreError::Copy {
            path: path.to_path_buf(),
            source: e,
        });
    }

    // fs::copy resolves symlinks on the source side, which is exactly the
    // content we want to materialize.
    if let Err(source) = fs::copy(path, &temp) {
        return Err(RestoreError::Copy {
            path: path.to_path_buf(),
            source,
        });
    }
    guard.state = RestoreState::Deleting;

    attrs::prepare_for_delete(path);
    if let Err(source) = fs::remove_file(path) {
        return Err(RestoreError::Delete {
            path: path.to_path_buf(),
            source,
        });
    }
    guard.state = RestoreState::Renaming;

    if let Err(source) = rename_step(&temp, path) {
        return Err(RestoreError::Rename {
            path: path.to_path_buf(),
            source,
        });
    }
    guard.state = RestoreState::Attributing;

    if let Err(e) = attrs::restore_subset(&original_meta, path) {
        log::debug!("cannot restore attributes on {}: {}", path.display(), e);
    }
    guard.state = RestoreState::Done;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(content).unwrap();
        path
    }

    fn no_temp_files(dir: &TempDir) -> bool {
        fs::read_dir(dir.path())
            .unwrap()
            .all(|e| !e.unwrap().file_name().to_string_lossy().contains("$$$"))
    }

    #[test]
    #[cfg(unix)]
    fn test_materializes_symlink_into_regular_file() {
        let dir = TempDir::new().unwrap();
        let real = write_file(&dir, "real.txt", b"the content");
        let link = dir.path().join("link.txt");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        materialize_back(&link).unwrap();

        let meta = fs::symlink_metadata(&link).unwrap();
        assert!(meta.file_type().is_file(), "link must become a real file");
        assert_eq!(fs::read(&link).unwrap(), b"the content");
        assert_eq!(fs::read(&real).unwrap(), b"the content");
        assert!(no_temp_files(&dir));
    }

    #[test]
    #[cfg(unix)]
    fn test_materializes_hard_link_into_independent_file() {
        use std::os::unix::fs::MetadataExt;

        let dir = TempDir::new().unwrap();
        let original = write_file(&dir, "a.bin", b"shared bytes");
        let link = dir.path().join("b.bin");
        fs::hard_link(&original, &link).unwrap();

        materialize_back(&link).unwrap();

        let ma = fs::metadata(&original).unwrap();
        let mb = fs::metadata(&link).unwrap();
        assert_ne!(ma.ino(), mb.ino(), "inodes must no longer be shared");
        assert_eq!(ma.nlink(), 1);
        assert_eq!(fs::read(&link).unwrap(), b"shared bytes");
        assert!(no_temp_files(&dir));
    }

    #[test]
    #[cfg(unix)]
    fn test_restores_readonly_bit() {
        let dir = TempDir::new().unwrap();
        let original = write_file(&dir, "a.bin", b"bytes");
        let link = dir.path().join("b.bin");
        fs::hard_link(&original, &link).unwrap();
        attrs::set_readonly(&link, true).unwrap();

        materialize_back(&link).unwrap();
        assert!(attrs::is_readonly(&link).unwrap());

        attrs::set_readonly(&link, false).unwrap();
        attrs::set_readonly(&original, false).unwrap();
    }

    #[test]
    fn test_missing_path_errors_cleanly() {
        let dir = TempDir::new().unwrap();
        let ghost = dir.path().join("ghost.bin");
        let err = materialize_back(&ghost).unwrap_err();
        assert!(matches!(err, RestoreError::Inspect { .. }));
        assert!(no_temp_files(&dir));
    }

    #[test]
    #[cfg(unix)]
    fn test_rename_failure_moves_copy_back() {
        let dir = TempDir::new().unwrap();
        let original = write_file(&dir, "a.bin", b"precious");
        let link = dir.path().join("b.bin");
        fs::hard_link(&original, &link).unwrap();

        FAIL_RENAME.with(|f| f.set(true));
        let err = materialize_back(&link).unwrap_err();
        assert!(matches!(err, RestoreError::Rename { .. }));

        // The compensation must have moved the copied bytes back.
        assert!(link.exists());
        assert_eq!(fs::read(&link).unwrap(), b"precious");
        assert!(no_temp_files(&dir));
    }
}
