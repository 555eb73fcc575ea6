//! User-Level Locks and Semaphores
//!
//! Kernel objects owned by a process and named by an opaque handle the
//! kernel hands out at creation. Lookups scan the process's table under
//! its mutex; the blocking operation runs after the mutex is released.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::kernel::process::{Process, ProcessError};
use crate::kernel::sync::{Lock, Semaphore};
use crate::kernel::Kernel;

/// Names a user lock or semaphore within its process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncHandle(pub u32);

impl fmt::Display for SyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct UserLock {
    pub handle: SyncHandle,
    lock: Lock,
}

pub struct UserSemaphore {
    pub handle: SyncHandle,
    sema: Semaphore,
}

pub struct UserSyncTable {
    next_handle: u32,
    locks: Vec<Arc<UserLock>>,
    semas: Vec<Arc<UserSemaphore>>,
}

impl UserSyncTable {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            locks: Vec::new(),
            semas: Vec::new(),
        }
    }

    fn issue(&mut self) -> SyncHandle {
        let handle = SyncHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        handle
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    pub fn sema_count(&self) -> usize {
        self.semas.len()
    }
}

impl Default for UserSyncTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    fn find_user_lock(&self, process: &Process, handle: SyncHandle) -> Result<Arc<UserLock>, ProcessError> {
        let table = process.user_sync.lock(self.scheduler());
        table
            .locks
            .iter()
            .find(|l| l.handle == handle)
            .cloned()
            .ok_or(ProcessError::NotFound)
    }

    fn find_user_sema(&self, process: &Process, handle: SyncHandle) -> Result<Arc<UserSemaphore>, ProcessError> {
        let table = process.user_sync.lock(self.scheduler());
        table
            .semas
            .iter()
            .find(|s| s.handle == handle)
            .cloned()
            .ok_or(ProcessError::NotFound)
    }

    pub fn lock_init(&self) -> Result<SyncHandle, ProcessError> {
        let process = self.current_process().ok_or(ProcessError::NoProcess)?;
        let mut table = process.user_sync.lock(self.scheduler());
        let handle = table.issue();
        table.locks.push(Arc::new(UserLock {
            handle,
            lock: Lock::new(),
        }));
        Ok(handle)
    }

    /// Blocks while another thread holds the lock. Re-acquiring fails.
    pub fn lock_acquire(&self, handle: SyncHandle) -> Result<(), ProcessError> {
        let process = self.current_process().ok_or(ProcessError::NoProcess)?;
        let lock = self.find_user_lock(&process, handle)?;
        drop(process);
        lock.lock.acquire(self.scheduler())?;
        Ok(())
    }

    pub fn lock_release(&self, handle: SyncHandle) -> Result<(), ProcessError> {
        let process = self.current_process().ok_or(ProcessError::NoProcess)?;
        let lock = self.find_user_lock(&process, handle)?;
        lock.lock.release(self.scheduler())?;
        Ok(())
    }

    pub fn sema_init(&self, value: i32) -> Result<SyncHandle, ProcessError> {
        if value < 0 {
            return Err(ProcessError::InvalidValue);
        }
        let process = self.current_process().ok_or(ProcessError::NoProcess)?;
        let mut table = process.user_sync.lock(self.scheduler());
        let handle = table.issue();
        table.semas.push(Arc::new(UserSemaphore {
            handle,
            sema: Semaphore::new(value as usize),
        }));
        Ok(handle)
    }

    pub fn sema_down(&self, handle: SyncHandle) -> Result<(), ProcessError> {
        let process = self.current_process().ok_or(ProcessError::NoProcess)?;
        let sema = self.find_user_sema(&process, handle)?;
        drop(process);
        sema.sema.down(self.scheduler());
        Ok(())
    }

    pub fn sema_up(&self, handle: SyncHandle) -> Result<(), ProcessError> {
        let process = self.current_process().ok_or(ProcessError::NoProcess)?;
        let sema = self.find_user_sema(&process, handle)?;
        sema.sema.up(self.scheduler());
        Ok(())
    }
}
