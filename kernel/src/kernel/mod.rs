//! Kernel Subsystems
//!
//! Process and thread lifecycle:
//! - Synchronization fabric
//! - Executable loading
//! - Processes, child wait/exit, and the launch handshake
//! - User threads and user-level locks/semaphores
//! - System calls
//!
//! Everything hangs off one [`Kernel`] value. Scheduling, paging and the
//! file system are collaborators supplied through [`Platform`].

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

pub mod config;
pub mod elf;
pub mod loader;
pub mod memory;
pub mod process;
pub mod scheduler;
pub mod sync;
pub mod syscall;
pub mod thread;
pub mod user_sync;

use crate::fs::{FdAllocator, FileSystem};
use memory::{Mmu, UserMemory};
use process::{ChildRecord, Process};
use scheduler::{Pid, Scheduler, Tid};
use sync::{Mutex, SpinLock};

// Re-export key types
pub use memory::{PAGE_SIZE, PHYS_BASE};
pub use process::ProcessError;

/// The machine-specific services the kernel runs on
#[derive(Clone)]
pub struct Platform {
    pub scheduler: Arc<dyn Scheduler>,
    pub mmu: Arc<dyn Mmu>,
    pub fs: Arc<dyn FileSystem>,
}

/// Kernel-wide lifecycle state
pub struct Kernel {
    platform: Platform,
    /// Every child record not yet waited on or orphaned
    children: Mutex<Vec<Arc<ChildRecord>>>,
    pub(crate) fds: FdAllocator,
    /// Serializes all file-system access
    filesys: Mutex<()>,
    /// Which process each kernel thread runs in
    registry: SpinLock<BTreeMap<Tid, Arc<Process>>>,
}

impl Kernel {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            children: Mutex::new(Vec::new()),
            fds: FdAllocator::new(),
            filesys: Mutex::new(()),
            registry: SpinLock::new(BTreeMap::new()),
        }
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        &*self.platform.scheduler
    }

    pub fn mmu(&self) -> &Arc<dyn Mmu> {
        &self.platform.mmu
    }

    pub fn fs(&self) -> &dyn FileSystem {
        &*self.platform.fs
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // THREAD → PROCESS REGISTRY
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn attach(&self, tid: Tid, process: Arc<Process>) {
        self.registry.lock().insert(tid, process);
    }

    pub(crate) fn detach(&self, tid: Tid) -> Option<Arc<Process>> {
        self.registry.lock().remove(&tid)
    }

    /// The process the calling thread runs in
    pub fn current_process(&self) -> Option<Arc<Process>> {
        self.process_of(self.scheduler().current())
    }

    pub fn process_of(&self, tid: Tid) -> Option<Arc<Process>> {
        self.registry.lock().get(&tid).cloned()
    }

    /// Kernel threads currently attached to some process
    pub fn attached_threads(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.current_process().map(|p| p.pid())
    }

    /// Context-switch hook: load the incoming thread's user mappings.
    pub fn activate(&self) {
        let space = self.current_process().and_then(|p| p.space_id());
        self.mmu().activate(space);
    }

    /// Checked access to the calling process's user memory
    pub fn user_memory(&self) -> Option<UserMemory<'_>> {
        let space = self.current_process()?.space_id()?;
        Some(UserMemory::new(&**self.mmu(), space))
    }
}
