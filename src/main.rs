//! hardlinker - deduplicate identical files with hard links
//!
//! Entry point for the hardlinker CLI.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use hardlinker::{cli::Cli, error::ExitCode, logging, signal, Merger};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging first; everything below may log.
    logging::init_logging(cli.verbose, cli.quiet);

    let handler = signal::install_handler();

    let roots = resolve_roots(&cli)?;
    let config = cli.to_configuration();
    log::debug!(
        "starting with {} threads over {} root(s)",
        config.max_crawler_threads,
        roots.len()
    );

    let merger = Merger::new(config).with_shutdown_flag(handler.get_flag());
    merger.run(&roots);

    if !cli.quiet {
        println!("{}", merger.stats().summary());
    }

    if handler.is_shutdown_requested() {
        std::process::exit(signal::EXIT_CODE_INTERRUPTED);
    }
    Ok(())
}

/// Canonicalize the requested directories; an empty list means the
/// current working directory. A missing directory ends the process with
/// the `DirectoryNotFound` exit code before the engine starts.
fn resolve_roots(cli: &Cli) -> Result<Vec<PathBuf>> {
    let requested = if cli.directories.is_empty() {
        vec![std::env::current_dir().context("cannot determine the current directory")?]
    } else {
        cli.directories.clone()
    };

    let mut roots = Vec::with_capacity(requested.len());
    for dir in requested {
        match dir.canonicalize() {
            Ok(resolved) if resolved.is_dir() => roots.push(resolved),
            _ => {
                eprintln!("directory not found: {}", dir.display());
                std::process::exit(ExitCode::DirectoryNotFound.as_i32());
            }
        }
    }
    Ok(roots)
}
