//! Test-and-test-and-set spinlock (C7).
//!
//! No fairness guarantee: under contention, any waiter may win the race to
//! acquire once the lock is released. Used as the innermost lock for every
//! other primitive in this module and for the fixed-size kernel tables
//! (frame allocator, kpool, vmem, process/thread tables, identity table).

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::x86::io::pause;

pub struct Spinlock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: `Spinlock<T>` only exposes `T` through a guard that holds the lock
// for its entire lifetime, so concurrent access is always serialized.
unsafe impl<T: Send> Sync for Spinlock<T> {}
unsafe impl<T: Send> Send for Spinlock<T> {}

pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Spins until the lock is free, testing before every `compare_exchange`
    /// attempt so a contended lock doesn't thrash the cache-coherence bus.
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinlockGuard { lock: self };
            }
            while self.locked.load(Ordering::Relaxed) {
                pause();
            }
        }
    }

    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinlockGuard { lock: self })
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

impl<'a, T> SpinlockGuard<'a, T> {
    /// Exposes the lock a guard was taken from, so `CondVar::wait` can drop
    /// the guard and later re-acquire the same lock.
    pub(crate) fn lock(&self) -> &'a Spinlock<T> {
        self.lock
    }
}

impl<'a, T> Deref for SpinlockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding `SpinlockGuard` implies the lock is held.
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for SpinlockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding `SpinlockGuard` implies the lock is held.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinlockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_excludes_concurrent_access() {
        let lock = Spinlock::new(0u32);
        {
            let mut guard = lock.lock();
            *guard += 1;
        }
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = Spinlock::new(());
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }
}
