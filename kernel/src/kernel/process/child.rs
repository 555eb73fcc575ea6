//! Parent/child exit status hand-off

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use super::ProcessError;
use crate::kernel::scheduler::Pid;
use crate::kernel::sync::Semaphore;
use crate::kernel::Kernel;

/// Bookkeeping between one `wait` and one `exit`.
///
/// Lives in the kernel-wide child list from the moment the parent learns
/// the child's pid until the parent has waited on it or has itself exited.
pub struct ChildRecord {
    pub child: Pid,
    pub parent: Pid,
    status: AtomicI32,
    /// Set, under the list lock, by the one `wait` allowed on this record
    claimed: AtomicBool,
    exited: Semaphore,
}

impl ChildRecord {
    pub fn new(child: Pid, parent: Pid) -> Self {
        Self {
            child,
            parent,
            status: AtomicI32::new(-1),
            claimed: AtomicBool::new(false),
            exited: Semaphore::new(0),
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

impl Kernel {
    /// Block until `child` exits and return its status.
    ///
    /// Fails at once if `child` is not an un-waited child of the caller.
    pub fn wait(&self, child: Pid) -> Result<i32, ProcessError> {
        let sched = self.scheduler();
        let me = self.current_process().ok_or(ProcessError::NoProcess)?.pid();

        let record = {
            let list = self.children.lock(sched);
            let record = list
                .iter()
                .find(|r| r.parent == me && r.child == child && !r.is_claimed())
                .cloned()
                .ok_or(ProcessError::NotFound)?;
            record.claimed.store(true, Ordering::Release);
            record
        };

        record.exited.down(sched);
        let status = record.status.load(Ordering::Acquire);

        self.children
            .lock(sched)
            .retain(|r| !Arc::ptr_eq(r, &record));
        Ok(status)
    }

    /// Record `pid`'s exit status for its parent and forget every child
    /// `pid` itself never waited on.
    pub(crate) fn publish_exit(&self, pid: Pid, status: i32) {
        let sched = self.scheduler();
        let mut list = self.children.lock(sched);
        if let Some(record) = list.iter().find(|r| r.child == pid) {
            record.status.store(status, Ordering::Release);
            record.exited.up(sched);
        }
        list.retain(|r| r.parent != pid);
    }

    /// Child records not yet consumed by a wait or discarded by a parent's exit
    pub fn pending_children(&self) -> usize {
        self.children.lock(self.scheduler()).len()
    }
}
