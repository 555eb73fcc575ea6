//! Launch Handshake
//!
//! Orders a new process's startup against its parent:
//!
//! ```text
//! Spawned ──report_loaded(true)──▶ LoadDecided(true) ──register──▶ Registered ──wait_registered──▶ Running
//!    └─────report_loaded(false)──▶ LoadDecided(false)   (terminal)
//! ```
//!
//! The child never runs user code before the parent's child record exists,
//! and the parent never publishes a record for a child that failed to load.
//! A failed child exits right after reporting; nobody registers it.

use crate::kernel::scheduler::Scheduler;
use crate::kernel::sync::{Semaphore, SpinLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Spawned,
    LoadDecided(bool),
    Registered,
    Running,
}

pub struct LaunchHandshake {
    state: SpinLock<LaunchState>,
    loaded: Semaphore,
    registered: Semaphore,
}

impl LaunchHandshake {
    pub const fn new() -> Self {
        Self {
            state: SpinLock::new(LaunchState::Spawned),
            loaded: Semaphore::new(0),
            registered: Semaphore::new(0),
        }
    }

    pub fn state(&self) -> LaunchState {
        *self.state.lock()
    }

    fn advance(&self, from: LaunchState, to: LaunchState) {
        let mut state = self.state.lock();
        debug_assert_eq!(*state, from, "launch handshake out of order");
        *state = to;
    }

    /// Child: publish the load outcome and wake the parent.
    pub fn report_loaded(&self, sched: &dyn Scheduler, ok: bool) {
        self.advance(LaunchState::Spawned, LaunchState::LoadDecided(ok));
        self.loaded.up(sched);
    }

    /// Parent: wait for the child's load outcome.
    pub fn wait_loaded(&self, sched: &dyn Scheduler) -> bool {
        self.loaded.down(sched);
        matches!(self.state(), LaunchState::LoadDecided(true))
    }

    /// Parent: the child record is in place, let the child run.
    pub fn register(&self, sched: &dyn Scheduler) {
        self.advance(LaunchState::LoadDecided(true), LaunchState::Registered);
        self.registered.up(sched);
    }

    /// Child: wait until the parent has registered us.
    pub fn wait_registered(&self, sched: &dyn Scheduler) {
        self.registered.down(sched);
        self.advance(LaunchState::Registered, LaunchState::Running);
    }
}

impl Default for LaunchHandshake {
    fn default() -> Self {
        Self::new()
    }
}
