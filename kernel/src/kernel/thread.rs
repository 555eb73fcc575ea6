//! User Threads
//!
//! Extra kernel threads running inside an existing process's address
//! space. Each gets its own stack slot below the main stack:
//!
//! ```text
//! PHYS_BASE - 1 page      main thread stack
//! PHYS_BASE - 2n pages    slot n: guard page (unmapped)
//! PHYS_BASE - 2n-1 pages  slot n: stack page, top at PHYS_BASE - 2n pages
//! ```
//!
//! and enters user mode through a stub called as `stub(entry, arg)`.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::kernel::config::MAX_THREADS;
use crate::kernel::memory::{UserAddr, PAGE_SIZE, PHYS_BASE};
use crate::kernel::process::{Process, ProcessError};
use crate::kernel::scheduler::{Tid, UserFrame};
use crate::kernel::sync::{Semaphore, SpinLock};
use crate::kernel::Kernel;
use crate::kdebug;

// ═══════════════════════════════════════════════════════════════════════════════
// JOIN TABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Join bookkeeping for one non-main thread
pub struct JoinRecord {
    pub tid: Tid,
    pub joined: bool,
    pub exited: bool,
    exit: Arc<Semaphore>,
}

impl JoinRecord {
    fn new(tid: Tid) -> Self {
        Self {
            tid,
            joined: false,
            exited: false,
            exit: Arc::new(Semaphore::new(0)),
        }
    }
}

/// Per-process thread bookkeeping
#[derive(Default)]
pub struct ThreadTable {
    records: Vec<JoinRecord>,
    /// Threads ever spawned; also the next stack slot
    spawned: usize,
}

impl ThreadTable {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            spawned: 0,
        }
    }

    pub fn spawned(&self) -> usize {
        self.spawned
    }

    fn find_mut(&mut self, tid: Tid) -> Option<&mut JoinRecord> {
        self.records.iter_mut().find(|r| r.tid == tid)
    }

    fn unjoined(&self) -> Vec<Tid> {
        self.records.iter().filter(|r| !r.joined).map(|r| r.tid).collect()
    }
}

/// Top of the stack for thread slot `n` (1-based)
pub fn thread_stack_top(n: usize) -> UserAddr {
    PHYS_BASE - (2 * PAGE_SIZE * n) as UserAddr
}

// ═══════════════════════════════════════════════════════════════════════════════
// THREAD SETUP
// ═══════════════════════════════════════════════════════════════════════════════

struct ThreadSetup {
    process: Arc<Process>,
    stub: UserAddr,
    entry: UserAddr,
    arg: u32,
    done: Semaphore,
    outcome: SpinLock<Result<(), ProcessError>>,
}

impl Kernel {
    /// Start a thread in the current process at `stub(entry, arg)`.
    ///
    /// Returns after the new thread has its stack and join record.
    pub fn spawn_thread(&'static self, stub: UserAddr, entry: UserAddr, arg: u32) -> Result<Tid, ProcessError> {
        let sched = self.scheduler();
        let process = self.current_process().ok_or(ProcessError::NoProcess)?;
        let name = process.name();

        let setup = Arc::new(ThreadSetup {
            process: process.clone(),
            stub,
            entry,
            arg,
            done: Semaphore::new(0),
            outcome: SpinLock::new(Err(ProcessError::ThreadSetupFailed)),
        });

        let child = setup.clone();
        let tid = sched
            .spawn(name, Box::new(move || {
                self.start_thread(child);
            }))
            .ok_or(ProcessError::ThreadSetupFailed)?;

        setup.done.down(sched);
        let outcome = *setup.outcome.lock();
        outcome.map(|()| tid)
    }

    fn start_thread(&self, setup: Arc<ThreadSetup>) -> ! {
        let sched = self.scheduler();
        let tid = sched.current();
        self.attach(tid, setup.process.clone());
        setup.process.activate(&**self.mmu());

        let result = self.setup_thread_stack(&setup, tid);
        if result.is_err() {
            self.detach(tid);
        }
        *setup.outcome.lock() = result.map(|_| ());
        setup.done.up(sched);
        drop(setup);

        match result {
            Ok(frame) => sched.jump_to_user(frame),
            Err(err) => {
                kdebug!("[THREAD] {} setup failed: {}", tid, err);
                sched.exit_current()
            }
        }
    }

    fn setup_thread_stack(&self, setup: &ThreadSetup, tid: Tid) -> Result<UserFrame, ProcessError> {
        let process = &setup.process;
        let slot = {
            let mut table = process.threads.lock(self.scheduler());
            table.spawned += 1;
            table.spawned
        };
        if slot > MAX_THREADS {
            return Err(ProcessError::TooManyThreads);
        }

        let top = thread_stack_top(slot);
        let esp = top - 16;
        process
            .with_space(|space| -> Result<(), ProcessError> {
                space.install_page(top - PAGE_SIZE as UserAddr, true)?;
                let mem = space.memory();
                mem.write_u32(esp, 0)?;
                mem.write_u32(esp + 4, setup.entry)?;
                mem.write_u32(esp + 8, setup.arg)?;
                mem.write_u32(esp + 12, 0)?;
                Ok(())
            })
            .ok_or(ProcessError::NoAddressSpace)??;

        process
            .threads
            .lock(self.scheduler())
            .records
            .push(JoinRecord::new(tid));
        kdebug!("[THREAD] {} slot {} esp={:#010x}", tid, slot, esp);
        Ok(UserFrame { eip: setup.stub, esp })
    }

    /// Wait for thread `tid` of the current process to exit.
    pub fn join(&self, tid: Tid) -> Result<Tid, ProcessError> {
        let sched = self.scheduler();
        if tid == sched.current() {
            return Err(ProcessError::JoinSelf);
        }
        let process = self.current_process().ok_or(ProcessError::NoProcess)?;

        let pending = {
            let mut table = process.threads.lock(sched);
            let record = table.find_mut(tid).ok_or(ProcessError::NotFound)?;
            if record.joined {
                return Err(ProcessError::AlreadyJoined);
            }
            record.joined = true;
            if record.exited {
                None
            } else {
                Some(record.exit.clone())
            }
        };

        if let Some(exit) = pending {
            exit.down(sched);
        }
        Ok(tid)
    }

    /// End the calling thread.
    ///
    /// On the main thread this joins every thread nobody joined yet and
    /// then exits the whole process with status 0.
    pub fn thread_exit(&self) -> ! {
        let sched = self.scheduler();
        let tid = sched.current();
        let process = match self.current_process() {
            Some(process) => process,
            None => sched.exit_current(),
        };

        if tid == process.pid() {
            loop {
                let unjoined = process.threads.lock(sched).unjoined();
                if unjoined.is_empty() {
                    break;
                }
                for other in unjoined {
                    // Losing a race with another joiner is fine; they wait instead.
                    let _ = self.join(other);
                }
            }
            drop(process);
            self.exit(0)
        }

        self.release_joiner(&process, tid);
        self.detach(tid);
        drop(process);
        sched.exit_current()
    }

    /// Mark `tid` exited and wake whoever joined it. No-op for the main thread.
    pub(crate) fn release_joiner(&self, process: &Process, tid: Tid) {
        let sched = self.scheduler();
        let mut table = process.threads.lock(sched);
        if let Some(record) = table.find_mut(tid) {
            record.exited = true;
            record.exit.up(sched);
        }
    }
}
