//! hardlinker - deduplicate identical files with hard links
//!
//! Walks one or more directory trees in parallel, groups files by size,
//! verifies byte-exact equality, and atomically replaces each duplicate
//! with a hard link (or, optionally, a symbolic link) to a retained twin.
//! Existing links can instead be deleted, re-materialized into independent
//! files, or marked readonly.

pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod fsys;
pub mod index;
pub mod logging;
pub mod merge;
pub mod scanner;
pub mod signal;
pub mod stats;

pub use config::Configuration;
pub use merge::Merger;
pub use stats::RuntimeStats;
