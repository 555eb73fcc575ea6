//! File System Collaborator
//!
//! The kernel never implements a file system itself. Whatever backs files
//! plugs in through [`FileSystem`] and hands out [`FileOps`] objects.

use alloc::sync::Arc;
use core::fmt;

use crate::kernel::sync::SpinLock;

/// Trait for File Operations
/// Every open file implements this.
pub trait FileOps: Send + Sync {
    /// Read from the current position. Returns the byte count actually read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, &'static str>;

    /// Write at the current position. A write-denied file writes nothing.
    fn write(&mut self, buf: &[u8]) -> Result<usize, &'static str>;

    fn seek(&mut self, pos: u64);

    fn tell(&self) -> u64;

    fn length(&self) -> u64;

    /// Refuse writes to the underlying file until this handle closes
    fn deny_write(&mut self);

    /// Release the handle. Lifts any write denial taken through it.
    fn close(&mut self);
}

/// A shared open file
pub type FileHandle = Arc<SpinLock<dyn FileOps>>;

/// Trait for Filesystem Operations
pub trait FileSystem: Send + Sync {
    fn open(&self, path: &str) -> Result<FileHandle, &'static str>;
    fn create(&self, path: &str, initial_size: u64) -> Result<(), &'static str>;
    fn remove(&self, path: &str) -> Result<(), &'static str>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNNING EXECUTABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// The image file of a live process.
///
/// Writes to the file are denied for as long as this value exists;
/// dropping it closes the handle and lets writers back in.
pub struct ExecutableFile {
    file: FileHandle,
}

impl ExecutableFile {
    pub fn open(fs: &dyn FileSystem, path: &str) -> Result<Self, &'static str> {
        let file = fs.open(path)?;
        file.lock().deny_write();
        Ok(Self { file })
    }

    pub fn handle(&self) -> &FileHandle {
        &self.file
    }

    pub fn length(&self) -> u64 {
        self.file.lock().length()
    }

    /// Read exactly `buf.len()` bytes at `offset`. False on a short read.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> bool {
        let mut file = self.file.lock();
        file.seek(offset);
        matches!(file.read(buf), Ok(n) if n == buf.len())
    }
}

impl fmt::Debug for ExecutableFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExecutableFile")
    }
}

impl Drop for ExecutableFile {
    fn drop(&mut self) {
        self.file.lock().close();
    }
}
