//! Counting semaphore (C7).
//!
//! `down` blocks while the count is non-positive; `up` increments and wakes
//! one waiter. This is the primitive the kernel-call dispatcher (C10) uses
//! for `kernel_sem`/`user_sem`: a semaphore starting at 0 guarantees that a
//! thread parked in `down` only proceeds once a matching `up` has occurred.

use crate::sync::condvar::CondVar;
use crate::sync::spinlock::Spinlock;

pub struct Semaphore {
    count: Spinlock<i64>,
    cond: CondVar,
}

impl Semaphore {
    pub const fn new(initial: i64) -> Self {
        Self {
            count: Spinlock::new(initial),
            cond: CondVar::new(),
        }
    }

    pub fn down(&self) {
        let mut guard = self.count.lock();
        while *guard <= 0 {
            guard = self.cond.wait(guard);
        }
        *guard -= 1;
    }

    pub fn up(&self) {
        {
            let mut guard = self.count.lock();
            *guard += 1;
        }
        self.cond.signal();
    }

    /// Non-blocking variant of `down`: decrements and returns `true` only if
    /// the count was already positive.
    pub fn try_down(&self) -> bool {
        let mut guard = self.count.lock();
        if *guard > 0 {
            *guard -= 1;
            true
        } else {
            false
        }
    }

    pub fn value(&self) -> i64 {
        *self.count.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_then_down_is_a_no_op_on_count() {
        let sem = Semaphore::new(0);
        sem.up();
        assert_eq!(sem.value(), 1);
        sem.down();
        assert_eq!(sem.value(), 0);
    }

    #[test]
    fn try_down_fails_on_empty_semaphore() {
        let sem = Semaphore::new(0);
        assert!(!sem.try_down());
        sem.up();
        assert!(sem.try_down());
        assert!(!sem.try_down());
    }
}
