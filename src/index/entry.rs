//! A seen file and its equality oracle.
//!
//! # Overview
//!
//! [`FileEntry`] is the immutable descriptor the size index keeps for every
//! discovered file: path, byte length at discovery, and a lazily computed
//! short digest. Equality of two entries is decided by a three-stage
//! pipeline (size, short digest, full bytewise comparison) ordered from
//! cheapest to most expensive.
//!
//! # Short digest
//!
//! Files below a 64-byte threshold use their raw content as the digest;
//! comparing digests then *is* comparing content. Larger files hash their
//! first and last block with SHA-512. The middle is intentionally not
//! covered: the digest only needs to be a cheap, high-confidence
//! inequality test, and the bytewise stage settles the rest.
//!
//! # Bytewise stage
//!
//! Blocks are visited in the outside-in shuffled order and read with
//! double buffering: a reader thread fetches the next block pair into
//! pooled buffers while the current pair is being compared. The first
//! mismatching block ends the comparison.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha512};

use crate::compare::{self, BufferPool};
use crate::fsys;

/// Below this size the short digest is the file content itself.
pub const SHORT_DIGEST_THRESHOLD: u64 = 64;

/// Immutable descriptor of one discovered file.
#[derive(Debug)]
pub struct FileEntry {
    path: PathBuf,
    size: u64,
    /// Computed at most once; concurrent observers share the published value.
    digest: OnceCell<Box<[u8]>>,
}

impl FileEntry {
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            digest: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The short digest, computing and caching it on first call.
    ///
    /// Identical file bytes always produce an identical digest.
    pub fn short_digest(&self) -> io::Result<&[u8]> {
        self.digest
            .get_or_try_init(|| self.compute_short_digest())
            .map(AsRef::as_ref)
    }

    fn compute_short_digest(&self) -> io::Result<Box<[u8]>> {
        if self.size < SHORT_DIGEST_THRESHOLD {
            return Ok(std::fs::read(&self.path)?.into_boxed_slice());
        }

        let file = File::open(&self.path)?;
        let pool = BufferPool::global();
        let bufsize = pool.block_len() as u64;
        let mut lease = pool.rent();
        let mut hasher = Sha512::new();

        let head_len = self.size.min(bufsize) as usize;
        fsys::read_full_at(&file, &mut lease[..head_len], 0)?;
        hasher.update(&lease[..head_len]);

        if self.size > bufsize {
            let tail_offset = bufsize.max(self.size - bufsize);
            let tail_len = (self.size - tail_offset) as usize;
            fsys::read_full_at(&file, &mut lease[..tail_len], tail_offset)?;
            hasher.update(&lease[..tail_len]);
        }

        Ok(hasher.finalize().as_slice().into())
    }

    /// Decide whether this entry and `other` hold identical bytes.
    ///
    /// I/O failures on either side are conservative: the files compare as
    /// not equal and the failure is logged. Index maintenance is left to
    /// the caller, which knows which side failed.
    #[must_use]
    pub fn content_equals(&self, other: &FileEntry) -> bool {
        if self.size != other.size {
            return false;
        }
        if self.size == 0 {
            return true;
        }

        let (mine, theirs) = match (self.short_digest(), other.short_digest()) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) => {
                log::warn!("digest of {} failed: {}", self.path.display(), e);
                return false;
            }
            (_, Err(e)) => {
                log::warn!("digest of {} failed: {}", other.path.display(), e);
                return false;
            }
        };
        if !compare::is_equal(mine, theirs) {
            return false;
        }
        if self.size < SHORT_DIGEST_THRESHOLD {
            // The digest was the raw content; nothing left to check.
            return true;
        }

        match self.bytewise_equals(other) {
            Ok(equal) => equal,
            Err(e) => {
                log::warn!(
                    "comparing {} with {} failed: {}",
                    self.path.display(),
                    other.path.display(),
                    e
                );
                false
            }
        }
    }

    /// Full content comparison with shuffled, double-buffered block reads.
    fn bytewise_equals(&self, other: &FileEntry) -> io::Result<bool> {
        let mine = File::open(&self.path)?;
        let theirs = File::open(&other.path)?;

        let pool = BufferPool::global();
        let bufsize = pool.block_len() as u64;
        let blocks = self.size.div_ceil(bufsize);
        let size = self.size;

        thread::scope(|scope| {
            // Rendezvous of depth one: the reader fetches block pair B
            // while the consumer compares pair A.
            let (sender, receiver) = mpsc::sync_channel(1);

            scope.spawn(move || {
                for block in compare::outside_in(blocks) {
                    let offset = block * bufsize;
                    let len = (size - offset).min(bufsize) as usize;
                    let mut a = pool.rent();
                    let mut b = pool.rent();
                    let read = fsys::read_full_at(&mine, &mut a[..len], offset)
                        .and_then(|()| fsys::read_full_at(&theirs, &mut b[..len], offset));
                    let failed = read.is_err();
                    if sender.send((a, b, len, read)).is_err() || failed {
                        // Consumer saw a mismatch (or we hit an error);
                        // either way there is nothing more to read.
                        return;
                    }
                }
            });

            while let Ok((a, b, len, read)) = receiver.recv() {
                read?;
                if !compare::is_equal(&a[..len], &b[..len]) {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(content).unwrap();
        path
    }

    fn entry_for(path: PathBuf) -> FileEntry {
        let size = std::fs::metadata(&path).unwrap().len();
        FileEntry::new(path, size)
    }

    #[test]
    fn test_small_file_digest_is_raw_content() {
        let dir = TempDir::new().unwrap();
        let entry = entry_for(write_file(&dir, "s.txt", b"abc"));
        assert_eq!(entry.short_digest().unwrap(), b"abc");
    }

    #[test]
    fn test_large_file_digest_is_sha512_sized() {
        let dir = TempDir::new().unwrap();
        let content = vec![0x5Au8; 4096];
        let entry = entry_for(write_file(&dir, "l.bin", &content));
        assert_eq!(entry.short_digest().unwrap().len(), 64);
    }

    #[test]
    fn test_digest_deterministic_across_entries() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();
        let a = entry_for(write_file(&dir, "a.bin", &content));
        let b = entry_for(write_file(&dir, "b.bin", &content));
        assert_eq!(a.short_digest().unwrap(), b.short_digest().unwrap());
    }

    #[test]
    fn test_digest_cached_after_first_computation() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.bin", &vec![1u8; 1000]);
        let entry = entry_for(path.clone());
        let first = entry.short_digest().unwrap().to_vec();

        // Rewriting the file must not change the published digest.
        std::fs::write(&path, vec![2u8; 1000]).unwrap();
        assert_eq!(entry.short_digest().unwrap(), first.as_slice());
    }

    #[test]
    fn test_content_equals_identical_files() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..50_000).map(|i| (i * 7 % 256) as u8).collect();
        let a = entry_for(write_file(&dir, "a.bin", &content));
        let b = entry_for(write_file(&dir, "b.bin", &content));
        assert!(a.content_equals(&b));
        assert!(b.content_equals(&a));
    }

    #[test]
    fn test_content_equals_small_files_via_raw_digest() {
        let dir = TempDir::new().unwrap();
        let a = entry_for(write_file(&dir, "a.txt", b"abc"));
        let b = entry_for(write_file(&dir, "b.txt", b"abc"));
        let c = entry_for(write_file(&dir, "c.txt", b"abd"));
        assert!(a.content_equals(&b));
        assert!(!a.content_equals(&c));
    }

    #[test]
    fn test_content_equals_differing_middle() {
        // A single-block file is covered by the head/tail hash entirely,
        // so this mismatch is already caught at the digest stage.
        let dir = TempDir::new().unwrap();
        let mut content = vec![0u8; 100_000];
        let a = entry_for(write_file(&dir, "a.bin", &content));
        content[50_000] = 1;
        let b = entry_for(write_file(&dir, "b.bin", &content));
        assert!(!a.content_equals(&b));
    }

    #[test]
    fn test_content_equals_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let a = entry_for(write_file(&dir, "a.bin", &vec![0u8; 100]));
        let b = entry_for(write_file(&dir, "b.bin", &vec![0u8; 101]));
        assert!(!a.content_equals(&b));
    }

    #[test]
    fn test_content_equals_zero_size() {
        let a = FileEntry::new(PathBuf::from("/nonexistent/a"), 0);
        let b = FileEntry::new(PathBuf::from("/nonexistent/b"), 0);
        assert!(a.content_equals(&b));
    }

    #[test]
    fn test_io_error_compares_not_equal() {
        let dir = TempDir::new().unwrap();
        let a = entry_for(write_file(&dir, "a.bin", &vec![0u8; 100]));
        let ghost = FileEntry::new(dir.path().join("missing.bin"), 100);
        assert!(!a.content_equals(&ghost));
        assert!(!ghost.content_equals(&a));
    }

    #[test]
    fn test_content_equals_multi_block() {
        // Larger than two pool blocks, forcing several shuffled,
        // double-buffered iterations.
        let dir = TempDir::new().unwrap();
        let block = BufferPool::global().block_len();
        let len = block * 2 + block / 2 + 17;
        let content: Vec<u8> = (0..len).map(|i| (i % 241) as u8).collect();

        let a = entry_for(write_file(&dir, "a.bin", &content));
        let b = entry_for(write_file(&dir, "b.bin", &content));
        assert!(a.content_equals(&b));

        let mut tweaked = content;
        let middle = len / 2;
        tweaked[middle] ^= 0xFF;
        let c = entry_for(write_file(&dir, "c.bin", &tweaked));
        assert!(!a.content_equals(&c));
    }
}
