use alloc::collections::VecDeque;

use super::SpinLock;
use crate::kernel::scheduler::{Scheduler, Tid};

struct SemaState {
    value: usize,
    waiters: VecDeque<Tid>,
}

/// Counting semaphore.
///
/// `down` sleeps while the count is zero, `up` increments and wakes the
/// oldest waiter. A woken waiter re-checks the count, so a thread that
/// slips in between `up` and the wakeup can win the permit; the loser just
/// goes back to sleep.
pub struct Semaphore {
    state: SpinLock<SemaState>,
}

impl Semaphore {
    pub const fn new(value: usize) -> Self {
        Self {
            state: SpinLock::new(SemaState {
                value,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Wait for a permit, blocking the calling kernel thread if none is available.
    pub fn down(&self, sched: &dyn Scheduler) {
        let me = sched.current();
        loop {
            {
                let mut state = self.state.lock();
                if state.value > 0 {
                    state.value -= 1;
                    // Woken early, or the permit came before our turn.
                    state.waiters.retain(|t| *t != me);
                    return;
                }
                if !state.waiters.contains(&me) {
                    state.waiters.push_back(me);
                }
            }
            sched.park();
        }
    }

    /// Take a permit only if one is immediately available.
    pub fn try_down(&self) -> bool {
        let mut state = self.state.lock();
        if state.value > 0 {
            state.value -= 1;
            true
        } else {
            false
        }
    }

    /// Release a permit and wake one waiter.
    pub fn up(&self, sched: &dyn Scheduler) {
        let woken = {
            let mut state = self.state.lock();
            state.value += 1;
            state.waiters.pop_front()
        };
        if let Some(tid) = woken {
            sched.unpark(tid);
        }
    }

    /// Current permit count (a snapshot)
    pub fn value(&self) -> usize {
        self.state.lock().value
    }

    /// Number of threads asleep on this semaphore (a snapshot)
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }
}
