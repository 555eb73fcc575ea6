use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use super::{Semaphore, SpinLock, SyncError};
use crate::kernel::scheduler::{Scheduler, Tid};

// ═══════════════════════════════════════════════════════════════════════════════
// SLEEPING LOCK
// ═══════════════════════════════════════════════════════════════════════════════

/// Non-recursive sleeping lock that remembers its holder.
pub struct Lock {
    sema: Semaphore,
    holder: SpinLock<Option<Tid>>,
}

impl Lock {
    pub const fn new() -> Self {
        Self {
            sema: Semaphore::new(1),
            holder: SpinLock::new(None),
        }
    }

    /// Block until the lock is free, then take it.
    ///
    /// Fails without blocking if the caller already holds it.
    pub fn acquire(&self, sched: &dyn Scheduler) -> Result<(), SyncError> {
        let me = sched.current();
        if *self.holder.lock() == Some(me) {
            return Err(SyncError::AlreadyHeld);
        }
        self.sema.down(sched);
        *self.holder.lock() = Some(me);
        Ok(())
    }

    /// Hand the lock back. Only the holder may release.
    pub fn release(&self, sched: &dyn Scheduler) -> Result<(), SyncError> {
        let me = sched.current();
        {
            let mut holder = self.holder.lock();
            if *holder != Some(me) {
                return Err(SyncError::NotHolder);
            }
            *holder = None;
        }
        self.sema.up(sched);
        Ok(())
    }

    pub fn holder(&self) -> Option<Tid> {
        *self.holder.lock()
    }

    pub fn held_by(&self, tid: Tid) -> bool {
        self.holder() == Some(tid)
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MUTEX<T>
// ═══════════════════════════════════════════════════════════════════════════════

/// A [`Lock`] that owns the data it protects.
///
/// Shared kernel lists live behind one of these; the only way to reach the
/// list is through the guard, so every scan and mutation is lock-scoped.
pub struct Mutex<T: ?Sized> {
    lock: Lock,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}

impl<T> Mutex<T> {
    pub const fn new(data: T) -> Self {
        Self {
            lock: Lock::new(),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> Mutex<T> {
    pub fn lock<'a>(&'a self, sched: &'a dyn Scheduler) -> MutexGuard<'a, T> {
        let acquired = self.lock.acquire(sched);
        assert!(acquired.is_ok(), "recursive acquisition of a kernel mutex");
        MutexGuard { mutex: self, sched }
    }
}

pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
    sched: &'a dyn Scheduler,
}

impl<'a, T: ?Sized> Deref for MutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized> Drop for MutexGuard<'a, T> {
    fn drop(&mut self) {
        // The guard exists only while this thread holds the lock.
        let _ = self.mutex.lock.release(self.sched);
    }
}
