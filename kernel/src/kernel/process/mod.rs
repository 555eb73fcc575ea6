//! Process Management
//!
//! A process is a user address space plus the kernel threads running in
//! it. The control block ([`Process`]) is shared by every thread attached
//! to it and lives as long as the last of them.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use heapless::String as BoundedString;

use crate::fs::{ExecutableFile, FileTable};
use crate::kernel::config::PROCESS_NAME_LEN;
use crate::kernel::loader::LoadError;
use crate::kernel::memory::{AddressSpace, MapError, MemoryFault, Mmu, SpaceId};
use crate::kernel::scheduler::Pid;
use crate::kernel::sync::{Mutex, SpinLock, SyncError};
use crate::kernel::thread::ThreadTable;
use crate::kernel::user_sync::UserSyncTable;

pub mod args;
pub mod child;
pub mod handshake;
pub mod lifecycle;

pub use child::ChildRecord;
pub use handshake::{LaunchHandshake, LaunchState};

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Process and thread operation errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessError {
    /// The child could not be started
    SpawnFailed,
    /// The executable did not load
    LoadFailed(LoadError),
    /// No such child, thread, or user sync object
    NotFound,
    /// Command line or argument frame does not fit in a page
    ArgumentsTooLong,
    /// More than MAX_ARGC arguments
    TooManyArguments,
    /// Command line has no program name
    EmptyCommand,
    /// The calling thread belongs to no process
    NoProcess,
    /// A thread tried to join itself
    JoinSelf,
    /// The thread was already joined
    AlreadyJoined,
    /// The new thread could not be started
    ThreadSetupFailed,
    /// The process used up its thread stack slots
    TooManyThreads,
    /// The process has no user address space
    NoAddressSpace,
    /// No frame for a stack page
    OutOfMemory,
    /// A user pointer did not check out
    Fault(MemoryFault),
    /// User lock misuse
    Sync(SyncError),
    /// Argument out of range
    InvalidValue,
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::SpawnFailed => write!(f, "could not start process"),
            ProcessError::LoadFailed(err) => write!(f, "load failed: {}", err),
            ProcessError::NotFound => write!(f, "not found"),
            ProcessError::ArgumentsTooLong => write!(f, "arguments too long"),
            ProcessError::TooManyArguments => write!(f, "too many arguments"),
            ProcessError::EmptyCommand => write!(f, "empty command line"),
            ProcessError::NoProcess => write!(f, "thread has no process"),
            ProcessError::JoinSelf => write!(f, "thread cannot join itself"),
            ProcessError::AlreadyJoined => write!(f, "thread already joined"),
            ProcessError::ThreadSetupFailed => write!(f, "could not start thread"),
            ProcessError::TooManyThreads => write!(f, "too many threads"),
            ProcessError::NoAddressSpace => write!(f, "no user address space"),
            ProcessError::OutOfMemory => write!(f, "out of memory"),
            ProcessError::Fault(fault) => write!(f, "bad user memory: {}", fault),
            ProcessError::Sync(err) => write!(f, "{}", err),
            ProcessError::InvalidValue => write!(f, "invalid value"),
        }
    }
}

impl From<LoadError> for ProcessError {
    fn from(err: LoadError) -> Self {
        ProcessError::LoadFailed(err)
    }
}

impl From<MemoryFault> for ProcessError {
    fn from(fault: MemoryFault) -> Self {
        ProcessError::Fault(fault)
    }
}

impl From<SyncError> for ProcessError {
    fn from(err: SyncError) -> Self {
        ProcessError::Sync(err)
    }
}

impl From<MapError> for ProcessError {
    fn from(err: MapError) -> Self {
        match err {
            MapError::OutOfMemory => ProcessError::OutOfMemory,
            MapError::AlreadyMapped | MapError::BadAddress => ProcessError::ThreadSetupFailed,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROCESS CONTROL BLOCK
// ═══════════════════════════════════════════════════════════════════════════════

pub type ProcessName = BoundedString<PROCESS_NAME_LEN>;

/// Process control block
pub struct Process {
    pid: Pid,
    name: ProcessName,
    parent: Option<Pid>,
    /// Read from the context-switch path, so only ever behind a spinlock
    space: SpinLock<Option<AddressSpace>>,
    exec_file: SpinLock<Option<ExecutableFile>>,
    pub(crate) files: SpinLock<FileTable>,
    pub(crate) threads: Mutex<ThreadTable>,
    pub(crate) user_sync: Mutex<UserSyncTable>,
    exiting: AtomicBool,
}

impl Process {
    /// A control block with no address space and empty tables.
    pub fn new(pid: Pid, name: &str, parent: Option<Pid>) -> Self {
        Self {
            pid,
            name: truncate_name(name),
            parent,
            space: SpinLock::new(None),
            exec_file: SpinLock::new(None),
            files: SpinLock::new(FileTable::new()),
            threads: Mutex::new(ThreadTable::new()),
            user_sync: Mutex::new(UserSyncTable::new()),
            exiting: AtomicBool::new(false),
        }
    }

    /// Process id, which is the main thread's tid
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    /// Take ownership of a loaded image
    pub fn install_image(&self, space: AddressSpace, file: ExecutableFile) {
        *self.space.lock() = Some(space);
        *self.exec_file.lock() = Some(file);
    }

    pub fn space_id(&self) -> Option<SpaceId> {
        self.space.lock().as_ref().map(AddressSpace::id)
    }

    pub fn has_address_space(&self) -> bool {
        self.space.lock().is_some()
    }

    pub(crate) fn with_space<R>(&self, f: impl FnOnce(&AddressSpace) -> R) -> Option<R> {
        self.space.lock().as_ref().map(f)
    }

    /// Load this process's mappings, or the kernel-only ones if it has none.
    pub fn activate(&self, mmu: &dyn Mmu) {
        mmu.activate(self.space_id());
    }

    /// Two-phase teardown of the address space.
    ///
    /// The field is cleared first, then the kernel-only mapping is loaded,
    /// and only then is the space destroyed. An `activate` that lands in
    /// between sees no space at all. Returns false if there was nothing
    /// to release.
    pub fn release_address_space(&self, mmu: &dyn Mmu) -> bool {
        let space = self.space.lock().take();
        match space {
            Some(space) => {
                mmu.activate(None);
                drop(space);
                true
            }
            None => false,
        }
    }

    /// Claim the teardown. Only the first caller gets true.
    pub(crate) fn begin_exit(&self) -> bool {
        !self.exiting.swap(true, Ordering::AcqRel)
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }

    /// Drop the executable handle, letting writers back in.
    pub fn close_executable(&self) {
        let file = self.exec_file.lock().take();
        drop(file);
    }

    /// Close every file still in the descriptor table.
    pub fn close_all_files(&self) {
        let files = self.files.lock().drain();
        for file in files {
            file.lock().close();
        }
    }

    pub fn open_files(&self) -> usize {
        self.files.lock().len()
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name.as_str())
            .field("parent", &self.parent)
            .finish()
    }
}

fn truncate_name(name: &str) -> ProcessName {
    let mut out = ProcessName::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
