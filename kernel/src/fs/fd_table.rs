//! Per-Process File Table
//!
//! Pure bookkeeping between descriptors and open files. Removing an entry
//! does not close the file; whoever removes it decides that.

use alloc::vec::Vec;

use super::vfs::FileHandle;
use crate::kernel::config::FIRST_FD;
use crate::kernel::process::ProcessError;
use crate::kernel::scheduler::Scheduler;
use crate::kernel::sync::Mutex;
use crate::kernel::Kernel;

/// File descriptor
pub type Fd = i32;

/// Standard input
pub const STDIN_FD: Fd = 0;
/// Standard output
pub const STDOUT_FD: Fd = 1;

/// One open-file entry
pub struct OpenFile {
    pub fd: Fd,
    pub file: FileHandle,
}

#[derive(Default)]
pub struct FileTable {
    entries: Vec<OpenFile>,
}

impl FileTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn insert(&mut self, fd: Fd, file: FileHandle) {
        self.entries.push(OpenFile { fd, file });
    }

    pub fn find(&self, fd: Fd) -> Option<FileHandle> {
        self.entries.iter().find(|e| e.fd == fd).map(|e| e.file.clone())
    }

    /// Remove the entry for `fd` and hand back its file, still open.
    pub fn remove(&mut self, fd: Fd) -> Option<FileHandle> {
        let idx = self.entries.iter().position(|e| e.fd == fd)?;
        Some(self.entries.remove(idx).file)
    }

    /// Empty the table, returning every file still in it.
    pub fn drain(&mut self) -> Vec<FileHandle> {
        self.entries.drain(..).map(|e| e.file).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Kernel-wide descriptor counter. Descriptors are never reused.
pub struct FdAllocator {
    next: Mutex<Fd>,
}

impl FdAllocator {
    pub const fn new() -> Self {
        Self {
            next: Mutex::new(FIRST_FD),
        }
    }

    pub fn allocate(&self, sched: &dyn Scheduler) -> Fd {
        let mut next = self.next.lock(sched);
        let fd = *next;
        *next += 1;
        fd
    }
}

impl Default for FdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CURRENT-PROCESS OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

impl Kernel {
    /// Give `file` a fresh descriptor in the current process.
    pub fn open_file(&self, file: FileHandle) -> Result<Fd, ProcessError> {
        let process = self.current_process().ok_or(ProcessError::NoProcess)?;
        let fd = self.fds.allocate(self.scheduler());
        process.files.lock().insert(fd, file);
        Ok(fd)
    }

    pub fn find_file(&self, fd: Fd) -> Option<FileHandle> {
        self.current_process()?.files.lock().find(fd)
    }

    /// Forget `fd` in the current process. The returned file is NOT closed.
    pub fn close_file(&self, fd: Fd) -> Option<FileHandle> {
        self.current_process()?.files.lock().remove(fd)
    }
}
