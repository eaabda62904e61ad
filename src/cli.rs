//! Command-line interface.
//!
//! Defines the argument surface with the clap derive API and maps the
//! parsed flags onto the engine [`Configuration`].
//!
//! # Example
//!
//! ```bash
//! # Deduplicate two trees, considering only files of 1 MiB and larger
//! hardlinker -m 1MiB /data/photos /backup/photos
//!
//! # Statistics only, no filesystem changes
//! hardlinker --info /data
//!
//! # Undo: turn every symlink back into an independent file
//! hardlinker --remove-symlinks /data
//! ```

use clap::Parser;
use std::path::PathBuf;

use crate::config::Configuration;

/// Deduplicate identical files by replacing copies with hard links.
///
/// Files are grouped by size, verified byte for byte, and replaced with a
/// hard link to a retained twin. Existing links can instead be deleted,
/// materialized back into independent files, or marked readonly.
#[derive(Debug, Parser)]
#[command(name = "hardlinker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directories to process (default: the current directory)
    #[arg(value_name = "DIR")]
    pub directories: Vec<PathBuf>,

    /// Only gather statistics; never modify the filesystem
    #[arg(short = 'v', long = "info")]
    pub info: bool,

    /// Number of crawler threads (default: min(logical CPUs, 8))
    #[arg(short = 't', long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    /// Minimum file size to consider (e.g. 4KiB, 1MB; default 1)
    #[arg(short = 'm', long = "minimum", value_name = "SIZE", value_parser = parse_size)]
    pub minimum: Option<u64>,

    /// Maximum file size to consider (e.g. 1GiB; default unlimited)
    #[arg(short = 'M', long = "maximum", value_name = "SIZE", value_parser = parse_size)]
    pub maximum: Option<u64>,

    /// Fall back to a symbolic link when hard-link creation fails
    #[arg(short = 's', long = "allow-symlink")]
    pub allow_symlink: bool,

    /// Delete files that already are hard links
    #[arg(long = "delete-hardlinks", help_heading = "Existing Links")]
    pub delete_hardlinks: bool,

    /// Delete files that are symbolic links
    #[arg(long = "delete-symlinks", help_heading = "Existing Links")]
    pub delete_symlinks: bool,

    /// Delete both kinds of existing links
    #[arg(short = 'D', long = "delete-links", help_heading = "Existing Links")]
    pub delete_links: bool,

    /// Replace existing hard links with independent copies
    #[arg(long = "remove-hardlinks", help_heading = "Existing Links")]
    pub remove_hardlinks: bool,

    /// Replace existing symbolic links with independent copies
    #[arg(long = "remove-symlinks", help_heading = "Existing Links")]
    pub remove_symlinks: bool,

    /// Replace both kinds of existing links with independent copies
    #[arg(short = 'R', long = "remove-links", help_heading = "Existing Links")]
    pub remove_links: bool,

    /// Set the readonly bit on newly created links
    #[arg(long = "set-readonly", help_heading = "Attributes")]
    pub set_readonly: bool,

    /// Set the readonly bit on links found during the walk
    #[arg(long = "update-readonly", help_heading = "Attributes")]
    pub update_readonly: bool,

    /// Set the readonly bit on new and existing links
    #[arg(long = "readonly", help_heading = "Attributes")]
    pub readonly: bool,

    /// Increase log verbosity (--verbose for debug, twice for trace)
    #[arg(long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Build the engine configuration from the parsed flags.
    #[must_use]
    pub fn to_configuration(&self) -> Configuration {
        let mut config = Configuration::default();
        if let Some(min) = self.minimum {
            config.min_size_bytes = min;
        }
        if let Some(max) = self.maximum {
            config.max_size_bytes = max;
        }
        if let Some(threads) = self.threads {
            config.max_crawler_threads = threads.max(1);
        }
        config.show_info_only = self.info;
        config.also_try_symlink = self.allow_symlink;
        config.delete_hardlinks = self.delete_hardlinks || self.delete_links;
        config.delete_symlinks = self.delete_symlinks || self.delete_links;
        config.remove_hardlinks = self.remove_hardlinks || self.remove_links;
        config.remove_symlinks = self.remove_symlinks || self.remove_links;

        let on_new = self.set_readonly || self.readonly;
        let on_existing = self.update_readonly || self.readonly;
        config.set_readonly_on_new_hard = on_new;
        config.set_readonly_on_new_sym = on_new;
        config.set_readonly_on_existing_hard = on_existing;
        config.set_readonly_on_existing_sym = on_existing;

        config
    }
}

/// Parse a human-readable size string into bytes.
///
/// Delegates to [`bytesize`], the crate that also formats the run
/// summary, so the sizes this tool accepts and the sizes it prints share
/// one vocabulary: decimal suffixes (KB, MB, ...), binary suffixes
/// (KiB, MiB, ...) and bare byte counts, case-insensitively.
///
/// # Errors
///
/// Returns an error for an empty string, a negative value, or anything
/// `bytesize` cannot understand.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("size must not be empty".to_string());
    }
    if trimmed.starts_with('-') {
        return Err(format!("size must not be negative: '{trimmed}'"));
    }
    trimmed
        .parse::<bytesize::ByteSize>()
        .map(|size| size.as_u64())
        .map_err(|e| format!("cannot parse size '{trimmed}': {e}"))
}
