//! Condition variable with an intrusive, fixed-size wait queue (C7).
//!
//! Mirrors the original implementation's `cond_wait`/`cond_anycast` pair:
//! `wait` must be called with the associated lock held, drops it for the
//! duration of the sleep, and re-acquires it before returning. The kernel
//! never produces spurious wakeups, but callers must still re-check their
//! predicate after `wait` returns, per the usual condvar contract.

use crate::config::THREADS_MAX;
use crate::sched::ThreadId;
use crate::sync::spinlock::{Spinlock, SpinlockGuard};

pub struct CondVar {
    waiters: Spinlock<[Option<ThreadId>; THREADS_MAX]>,
}

impl CondVar {
    pub const fn new() -> Self {
        Self {
            waiters: Spinlock::new([None; THREADS_MAX]),
        }
    }

    fn enqueue(&self, tid: ThreadId) {
        let mut q = self.waiters.lock();
        for slot in q.iter_mut() {
            if slot.is_none() {
                *slot = Some(tid);
                return;
            }
        }
        unreachable!("wait queue cannot overflow: bounded by the thread table itself");
    }

    fn dequeue_one(&self) -> Option<ThreadId> {
        let mut q = self.waiters.lock();
        for slot in q.iter_mut() {
            if let Some(tid) = slot.take() {
                return Some(tid);
            }
        }
        None
    }

    fn dequeue_all(&self) -> impl Iterator<Item = ThreadId> {
        let mut q = self.waiters.lock();
        let mut drained = [None; THREADS_MAX];
        for (dst, src) in drained.iter_mut().zip(q.iter_mut()) {
            *dst = src.take();
        }
        drained.into_iter().flatten()
    }

    /// Atomically enqueues the calling thread and drops `guard`, parks it,
    /// then re-acquires the same lock once woken.
    pub fn wait<'a, T>(&self, guard: SpinlockGuard<'a, T>) -> SpinlockGuard<'a, T> {
        let lock = guard.lock();
        self.enqueue(crate::sched::current_thread_id());
        drop(guard);
        crate::sched::thread_sleep();
        lock.lock()
    }

    /// Wakes the longest-waiting thread, if any.
    pub fn signal(&self) {
        if let Some(tid) = self.dequeue_one() {
            crate::sched::thread_wakeup(tid);
        }
    }

    /// Wakes every waiting thread.
    pub fn broadcast(&self) {
        for tid in self.dequeue_all() {
            crate::sched::thread_wakeup(tid);
        }
    }
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_dequeue_is_fifo() {
        let cv = CondVar::new();
        cv.enqueue(ThreadId::new(1));
        cv.enqueue(ThreadId::new(2));
        assert_eq!(cv.dequeue_one(), Some(ThreadId::new(1)));
        assert_eq!(cv.dequeue_one(), Some(ThreadId::new(2)));
        assert_eq!(cv.dequeue_one(), None);
    }

    #[test]
    fn dequeue_all_drains_every_waiter() {
        let cv = CondVar::new();
        cv.enqueue(ThreadId::new(1));
        cv.enqueue(ThreadId::new(2));
        cv.enqueue(ThreadId::new(3));
        let count = cv.dequeue_all().count();
        assert_eq!(count, 3);
        assert_eq!(cv.dequeue_one(), None);
    }
}
