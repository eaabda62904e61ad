//! Reusable block buffers for the comparison pipeline.
//!
//! A process-wide pool of cluster-sized buffers. Renting never blocks: if
//! the free list is empty or its lock is contended, a fresh buffer is
//! allocated instead. Returning is best-effort: a contended lock or a full
//! free list simply drops the buffer. Leases return their buffer on drop,
//! on every control-flow exit including panics.

use std::ops::{Deref, DerefMut};
use std::path::Path;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::fsys;

/// Fallback block size when disk geometry is unavailable.
pub const DEFAULT_BLOCK_LEN: usize = 4 * 1024 * 1024;

/// Lower clamp for geometry-derived block sizes.
const MIN_BLOCK_LEN: usize = 64 * 1024;

/// Upper clamp for geometry-derived block sizes.
const MAX_BLOCK_LEN: usize = 16 * 1024 * 1024;

/// Buffers kept idle before returns are discarded.
const MAX_IDLE: usize = 32;

static POOL: OnceCell<BufferPool> = OnceCell::new();

/// Process-wide pool of fixed-size block buffers.
#[derive(Debug)]
pub struct BufferPool {
    block_len: usize,
    idle: Mutex<Vec<Box<[u8]>>>,
}

impl BufferPool {
    fn with_block_len(block_len: usize) -> Self {
        Self {
            block_len,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide pool, initialized with the default block size if
    /// [`init_for`](Self::init_for) has not run yet.
    pub fn global() -> &'static BufferPool {
        POOL.get_or_init(|| Self::with_block_len(DEFAULT_BLOCK_LEN))
    }

    /// Initialize the global pool with a block size derived from the
    /// cluster geometry of the filesystem holding `path`.
    ///
    /// The block size is `256 x cluster size`, clamped to a sensible
    /// range. No-op if the pool was already initialized; the winner of a
    /// racing first use keeps its size for the rest of the process.
    pub fn init_for(path: &Path) -> &'static BufferPool {
        POOL.get_or_init(|| {
            let block_len = fsys::cluster_size(path)
                .map(|cluster| (cluster.saturating_mul(256)).clamp(MIN_BLOCK_LEN, MAX_BLOCK_LEN))
                .unwrap_or(DEFAULT_BLOCK_LEN);
            log::debug!("buffer pool block size: {} bytes", block_len);
            Self::with_block_len(block_len)
        })
    }

    /// Size in bytes of every buffer handed out by this pool.
    #[must_use]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Rent a buffer of `block_len` bytes.
    ///
    /// Never blocks: when the free list is empty or another thread holds
    /// its lock, a fresh buffer is allocated.
    #[must_use]
    pub fn rent(&'static self) -> BlockLease {
        let recycled = self.idle.try_lock().and_then(|mut idle| idle.pop());
        let buf =
            recycled.unwrap_or_else(|| vec![0u8; self.block_len].into_boxed_slice());
        BlockLease {
            pool: self,
            buf: Some(buf),
        }
    }

    fn give_back(&self, buf: Box<[u8]>) {
        if let Some(mut idle) = self.idle.try_lock() {
            if idle.len() < MAX_IDLE {
                idle.push(buf);
            }
        }
        // Contended or full: the buffer is simply dropped.
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// An exclusively owned buffer, returned to its pool on drop.
#[derive(Debug)]
pub struct BlockLease {
    pool: &'static BufferPool,
    buf: Option<Box<[u8]>>,
}

impl Deref for BlockLease {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().expect("lease holds a buffer until drop")
    }
}

impl DerefMut for BlockLease {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf
            .as_deref_mut()
            .expect("lease holds a buffer until drop")
    }
}

impl Drop for BlockLease {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.give_back(buf);
        }
    }
}
