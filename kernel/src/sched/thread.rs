//! Thread table entry shape (C8).
//!
//! State names and the table layout are taken directly from the original
//! implementation's thread header: `AVAILABLE -> STARTED -> READY <-> RUNNING`,
//! with `WAITING` entered via `thread_sleep` and `TERMINATED` entered via
//! `thread_exit` (reclaimed by a subsequent `thread_free`).

use crate::arch::x86::context::Context;
use crate::error::{KernelError, KernelResult};

/// A thread identifier. Slot index into the fixed thread table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u32);

impl ThreadId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A process identifier, re-exported here because thread slots carry their
/// owning process's id (C9 owns the authoritative definition).
pub type ProcessId = crate::process::ProcessId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Available,
    Started,
    Ready,
    Running,
    Waiting,
    Terminated,
}

/// Whether a terminated thread's slot auto-reaps, or waits for a matching
/// `thread_join` (the spec's Open Question on join/detach semantics,
/// resolved by adding this field rather than a second kcall table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapPolicy {
    /// Default: a `thread_join` call reaps the slot itself once it observes
    /// `Terminated`.
    Joinable,
    /// Set by `thread_detach`: the slot is freed automatically the instant
    /// the thread reaches `Terminated`, and a later `thread_join` on it
    /// fails with `Inval`.
    Detached,
}

pub struct ThreadSlot {
    pub tid: ThreadId,
    pub pid: ProcessId,
    pub age: u32,
    pub state: ThreadState,
    pub quantum: u32,
    pub reap_policy: ReapPolicy,
    /// Set by `thread_join` before it parks, cleared when the slot is reaped
    /// (`ThreadSlot::empty`). While set, `thread_detach` on this slot fails
    /// with `Inval`: detaching a thread another thread is already blocked
    /// joining would let the detaching reap race the joiner's own reap of
    /// the same slot.
    pub join_pending: bool,
    pub ctx: Context,
    /// Base of this thread's kernel stack, owned by the kernel page pool
    /// (C3); `None` for a slot that has never been populated.
    pub stack: Option<u32>,
}

impl ThreadSlot {
    pub fn empty(tid: ThreadId) -> Self {
        Self {
            tid,
            pid: ProcessId::new(0),
            age: 0,
            state: ThreadState::Available,
            quantum: 0,
            reap_policy: ReapPolicy::Joinable,
            join_pending: false,
            ctx: Context::default(),
            stack: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == ThreadState::Available
    }

    pub fn require_terminated(&self) -> KernelResult<()> {
        if self.state != ThreadState::Terminated {
            return Err(KernelError::Inval {
                reason: "thread_free requires a terminated slot",
            });
        }
        Ok(())
    }
}
