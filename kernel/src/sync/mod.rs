//! In-kernel synchronization primitives (C7): spinlock, condition variable,
//! ticket mutex, and counting semaphore, each built directly on atomics
//! rather than wrapping a third-party lock, since composing them correctly
//! (condvar parking into the scheduler, semaphore serializing the
//! kernel-call scoreboard) is itself part of this nucleus's contract.

pub mod condvar;
pub mod mutex;
pub mod semaphore;
pub mod spinlock;

pub use condvar::CondVar;
pub use mutex::TicketMutex;
pub use semaphore::Semaphore;
pub use spinlock::{Spinlock, SpinlockGuard};
