//! Process exit codes.
//!
//! In-run engine errors never influence the exit code; only pre-flight
//! failures (a missing root directory) and an interrupt do.

/// Exit codes for the hardlinker binary.
///
/// - 0: the run completed.
/// - -1 (255 as seen by the shell): a root directory does not exist.
/// - 130: interrupted by Ctrl+C (128 + SIGINT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// The run completed (in-run errors are logged, not fatal).
    Success = 0,
    /// A root directory was missing before the engine started.
    DirectoryNotFound = -1,
    /// Interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// The numeric code to pass to `std::process::exit`.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
