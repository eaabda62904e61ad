//! Ctrl+C handling.
//!
//! A single shared `AtomicBool` signals shutdown to the crawler workers.
//! Workers drain the remaining directories without processing them, so
//! in-flight link transactions reach their compensating path before the
//! process exits with code 130.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code for SIGINT interruption (128 + 2).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared flag set when shutdown was requested.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Manually request a shutdown (used by tests).
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to the crawler workers.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the Ctrl+C handler, or reuse the already-installed one.
///
/// Never fails hard: when another handler owns the signal (parallel
/// tests), an unhooked handler is returned that still supports manual
/// shutdown requests.
pub fn install_handler() -> ShutdownHandler {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return handler.clone();
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    match ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
        let _ = std::io::stderr().flush();
    }) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            handler
        }
        Err(_) => {
            log::debug!("Ctrl+C handler already registered, using unhooked handler");
            let fallback = ShutdownHandler::new();
            let _ = GLOBAL_HANDLER.set(fallback.clone());
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_starts_clear() {
        let handler = ShutdownHandler::new();
        assert!(!handler.is_shutdown_requested());
    }

    #[test]
    fn test_request_shutdown_sets_flag() {
        let handler = ShutdownHandler::new();
        handler.request_shutdown();
        assert!(handler.is_shutdown_requested());
        assert!(handler.get_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_clone_shares_state() {
        let handler = ShutdownHandler::new();
        let clone = handler.clone();
        handler.request_shutdown();
        assert!(clone.is_shutdown_requested());
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(EXIT_CODE_INTERRUPTED, 130);
    }
}
