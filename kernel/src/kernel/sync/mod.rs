//! Synchronization Fabric
//!
//! Layered from the bottom up:
//! - [`SpinLock`]: atomic flag, never sleeps
//! - [`Semaphore`]: counting semaphore that parks waiters through the scheduler
//! - [`Lock`]: non-recursive sleeping lock with a recorded holder
//! - [`Mutex`]: a `Lock` that owns the data it guards

use core::fmt;

pub mod spinlock;
pub mod semaphore;
pub mod lock;

pub use lock::{Lock, Mutex, MutexGuard};
pub use semaphore::Semaphore;
pub use spinlock::{SpinLock, SpinLockGuard};

/// Misuse of a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// The caller tried to acquire a lock it already holds
    AlreadyHeld,
    /// The caller tried to release a lock it does not hold
    NotHolder,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::AlreadyHeld => write!(f, "lock already held by caller"),
            SyncError::NotHolder => write!(f, "lock not held by caller"),
        }
    }
}
