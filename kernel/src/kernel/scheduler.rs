//! Scheduler Interface
//!
//! The thread scheduler and context-switch mechanism live outside this crate.
//! Everything here talks to them through the [`Scheduler`] trait.

use alloc::boxed::Box;
use core::fmt;

use crate::kernel::memory::UserAddr;

/// Kernel thread identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A process is named by the tid of its main thread.
pub type Pid = Tid;

/// Body of a freshly spawned kernel thread
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

/// Register state handed to user mode on the first return from the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFrame {
    /// Initial instruction pointer
    pub eip: UserAddr,
    /// Initial stack pointer
    pub esp: UserAddr,
}

/// The thread scheduler, as seen by the lifecycle core.
///
/// `park`/`unpark` carry a wake token: an `unpark` that lands before the
/// matching `park` makes that `park` return immediately. The fabric's
/// semaphores rely on this to avoid lost wakeups.
pub trait Scheduler: Send + Sync {
    /// Create a kernel thread running `entry`. `None` if no thread could be made.
    fn spawn(&self, name: &str, entry: ThreadEntry) -> Option<Tid>;

    /// Identifier of the running kernel thread
    fn current(&self) -> Tid;

    /// Block the running thread until it is unparked
    fn park(&self);

    /// Make `tid` runnable again
    fn unpark(&self, tid: Tid);

    /// Terminate the running kernel thread
    fn exit_current(&self) -> !;

    /// Drop to user mode with the given registers. Never returns to the caller.
    fn jump_to_user(&self, frame: UserFrame) -> !;
}
