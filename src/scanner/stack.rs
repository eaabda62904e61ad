//! Shared directory stack with quiescent termination.
//!
//! # Overview
//!
//! Workers share one LIFO of pending directories. There is no central
//! coordinator: termination is detected exactly when every worker
//! simultaneously observes an empty stack. Each worker loops on
//! [`WorkStack::pop_or_wait`]; a worker that finds the stack empty retires
//! from the active count, and the last one to retire wakes a sleeping peer
//! so the exit cascades through all of them.
//!
//! Pushes signal once per pushed directory, so newly arrived work is never
//! missed by a sleeper.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

/// LIFO of pending directories shared by all crawler workers.
#[derive(Debug)]
pub struct WorkStack {
    stack: Mutex<Vec<PathBuf>>,
    signal: Condvar,
    /// Workers currently busy (popped a directory, or still probing).
    active: AtomicUsize,
}

impl WorkStack {
    /// Create a stack for `workers` cooperating threads.
    ///
    /// Every worker counts as active until it first observes an empty
    /// stack.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            stack: Mutex::new(Vec::new()),
            signal: Condvar::new(),
            active: AtomicUsize::new(workers),
        }
    }

    /// Push a directory and wake one potential sleeper.
    pub fn push(&self, dir: PathBuf) {
        self.stack.lock().push(dir);
        self.signal.notify_one();
    }

    /// Pop the next directory, sleeping while the stack is empty.
    ///
    /// Returns `None` when the run is over: the stack is empty and every
    /// worker is idle at the same time. The worker receiving `None` must
    /// not call again.
    pub fn pop_or_wait(&self) -> Option<PathBuf> {
        let mut stack = self.stack.lock();
        loop {
            if let Some(dir) = stack.pop() {
                return Some(dir);
            }
            if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
                // Everyone is idle now. Wake one peer so the exit
                // cascades through the remaining sleepers.
                self.signal.notify_one();
                return None;
            }
            self.signal.wait(&mut stack);
            self.active.fetch_add(1, Ordering::AcqRel);
        }
    }
}
