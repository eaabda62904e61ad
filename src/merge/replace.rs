//! The replace-with-link transaction.
//!
//! # Overview
//!
//! Turns a verified duplicate into a link to its retained twin. The link
//! is first created under a reserved temporary name next to the victim,
//! then swapped into place with a compensated delete-and-rename. At every
//! failure point the filesystem is restored to a state indistinguishable
//! from before the transaction (or, once the victim is gone, to an
//! equivalent copy), and the temporary never survives.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Configuration;
use crate::fsys::{self, attrs};

/// Which kind of link a successful replacement produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Hard,
    Symbolic,
}

/// Error type for the replace-with-link transaction.
#[derive(Debug, Error)]
pub enum ReplaceError {
    /// No temporary name could be reserved next to the victim.
    #[error("cannot reserve temporary name for {path}: {source}")]
    Reserve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Neither a hard link nor (if enabled) a symlink could be created.
    #[error("cannot link {path} to {twin}: {source}")]
    CreateLink {
        path: PathBuf,
        twin: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The delete-and-rename swap failed; the pre-transaction state was
    /// restored.
    #[error("swap failed for {path}: {source}")]
    Swap {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
thread_local! {
    /// Injects one rename failure into the next swap (crash testing).
    static FAIL_RENAME: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

fn rename_step(temp: &Path, victim: &Path) -> io::Result<()> {
    #[cfg(test)]
    if FAIL_RENAME.with(std::cell::Cell::take) {
        return Err(io::Error::other("injected rename failure"));
    }
    fs::rename(temp, victim)
}

/// Replace `victim` with a link to `twin`.
///
/// On success `victim` is a hard link (or, with the fallback enabled and
/// hard-link creation failing, a symbolic link) to `twin`, carrying the
/// requested readonly bit. On failure the caller may try the next twin:
/// `victim` is untouched, or, if the swap itself failed after the delete
/// step, holds a fresh copy of its original bytes.
pub fn replace_with_link(
    victim: &Path,
    twin: &Path,
    config: &Configuration,
) -> Result<LinkKind, ReplaceError> {
    let temp = fsys::reserve_temp_name(victim).map_err(|source| ReplaceError::Reserve {
        path: victim.to_path_buf(),
        source,
    })?;

    let kind = match fsys::create_hard_link(twin, &temp) {
        Ok(()) => LinkKind::Hard,
        Err(hard_err) if config.also_try_symlink => {
            log::debug!(
                "hard link {} -> {} failed ({}), trying symlink",
                temp.display(),
                twin.display(),
                hard_err
            );
            match fsys::create_symbolic_link(twin, &temp) {
                Ok(()) => LinkKind::Symbolic,
                Err(source) => {
                    return Err(ReplaceError::CreateLink {
                        path: victim.to_path_buf(),
                        twin: twin.to_path_buf(),
                        source,
                    })
                }
            }
        }
        Err(source) => {
            return Err(ReplaceError::CreateLink {
                path: victim.to_path_buf(),
                twin: twin.to_path_buf(),
                source,
            })
        }
    };

    swap_into_place(victim, &temp).map_err(|source| ReplaceError::Swap {
        path: victim.to_path_buf(),
        source,
    })?;

    let want_readonly = match kind {
        LinkKind::Hard => config.set_readonly_on_new_hard,
        LinkKind::Symbolic => config.set_readonly_on_new_sym,
    };
    if want_readonly {
        if let Err(e) = attrs::set_readonly(victim, true) {
            log::warn!("cannot set readonly on {}: {}", victim.display(), e);
        }
    }

    Ok(kind)
}

/// Delete `victim` and move `temp` into its place, compensating on every
/// failure point.
fn swap_into_place(victim: &Path, temp: &Path) -> io::Result<()> {
    if let Err(e) = attrs::set_readonly(victim, false) {
        remove_temp(temp);
        return Err(e);
    }
    if let Err(e) = fs::remove_file(victim) {
        remove_temp(temp);
        return Err(e);
    }
    if let Err(e) = rename_step(temp, victim) {
        // The victim is already gone: bring its bytes back from the link,
        // then drop the temporary.
        if let Err(copy_err) = fs::copy(temp, victim) {
            log::error!(
                "recovery copy {} -> {} failed: {}",
                temp.display(),
                victim.display(),
                copy_err
            );
        }
        remove_temp(temp);
        return Err(e);
    }
    Ok(())
}

fn remove_temp(temp: &Path) {
    if let Err(e) = fs::remove_file(temp) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!("cannot remove temporary {}: {}", temp.display(), e);
        }
    }
}
