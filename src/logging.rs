//! Logging setup.
//!
//! Structured logging via the `log` facade with an `env_logger` backend.
//! The level is resolved in priority order:
//!
//! 1. `RUST_LOG` environment variable, when set
//! 2. `--quiet` (errors only) or `--verbose`/`-vv` (debug/trace)
//! 3. default: info

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize the logging subsystem from the CLI verbosity flags.
///
/// Call once, before any logging happens.
///
/// # Panics
///
/// Panics when called twice: `env_logger` installs a process-global
/// logger.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(|buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        writeln!(buf, "{style}{level:<5}{style:#} {}", record.args())
    });

    builder.init();
}

/// Map verbosity flags to a level filter.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
