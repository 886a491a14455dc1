//! Ticket mutex (C7): FIFO-fair mutual exclusion.
//!
//! Grounded directly in the original implementation's `mutex_lock`/
//! `mutex_unlock`: a spinlock-protected ticket counter plus a condition
//! variable, rather than a busy-wait, so a blocked thread yields the CPU
//! instead of spinning.

use crate::sched::ThreadId;
use crate::sync::condvar::CondVar;
use crate::sync::spinlock::Spinlock;

struct State {
    next_ticket: u64,
    curr_ticket: u64,
    owner: Option<ThreadId>,
}

pub struct TicketMutex {
    state: Spinlock<State>,
    cond: CondVar,
}

impl TicketMutex {
    pub const fn new() -> Self {
        Self {
            state: Spinlock::new(State {
                next_ticket: 0,
                curr_ticket: 0,
                owner: None,
            }),
            cond: CondVar::new(),
        }
    }

    /// Allocates a ticket and waits until it is served, in arrival order.
    pub fn lock(&self) {
        let mut guard = self.state.lock();
        let ticket = guard.next_ticket;
        guard.next_ticket += 1;

        while guard.curr_ticket < ticket {
            guard = self.cond.wait(guard);
        }
        debug_assert_eq!(guard.curr_ticket, ticket);
        debug_assert!(guard.owner.is_none());
        guard.owner = Some(crate::sched::current_thread_id());
    }

    /// Releases the mutex, waking every parked thread so whichever holds the
    /// next ticket proceeds (others re-check their ticket and go back to
    /// sleep, matching the original's `cond_anycast`-then-recheck idiom).
    pub fn unlock(&self) {
        let mut guard = self.state.lock();
        debug_assert_eq!(guard.owner, Some(crate::sched::current_thread_id()));
        guard.curr_ticket += 1;
        guard.owner = None;
        drop(guard);
        self.cond.broadcast();
    }
}

impl Default for TicketMutex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_are_issued_in_arrival_order() {
        let m = TicketMutex::new();
        {
            let mut guard = m.state.lock();
            assert_eq!(guard.next_ticket, 0);
            guard.next_ticket = 5;
            guard.curr_ticket = 5;
        }
        m.lock();
        {
            let guard = m.state.lock();
            assert_eq!(guard.curr_ticket, 5);
        }
        m.unlock();
        let guard = m.state.lock();
        assert_eq!(guard.curr_ticket, 6);
    }
}
