//! Cooperative round-robin-with-aging scheduler (C8).
//!
//! The *selection* logic — which `Ready` thread runs next — is a pure
//! function over a thread-slot slice with no side effects, kept apart from
//! the side-effecting context switch. This split is what lets the host test
//! harness (C17) exercise aging/tie-break behavior without real hardware.

use core::cmp::Reverse;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::x86::context::Context;
use crate::config::{DEFAULT_QUANTUM, IDLE_THREAD_ID, SERVICE_THREAD_ID, THREADS_MAX};
use crate::error::{KernelError, KernelResult};
use crate::process::ProcessId;
use crate::sched::thread::{ReapPolicy, ThreadId, ThreadSlot, ThreadState};
use crate::sync::{CondVar, Spinlock};

/// Picks the `Ready` slot with the highest `age`, breaking ties by lowest
/// `tid`. Returns `None` if no slot is ready (the caller falls back to the
/// idle thread).
pub fn select_next(threads: &[ThreadSlot]) -> Option<ThreadId> {
    threads
        .iter()
        .filter(|t| t.state == ThreadState::Ready)
        .max_by_key(|t| (t.age, Reverse(t.tid.raw())))
        .map(|t| t.tid)
}

/// Advances the age of every `Ready` thread by one tick, as the scheduler
/// does once per `thread_yield` call before selecting the next thread.
pub fn age_ready_threads(threads: &mut [ThreadSlot]) {
    for t in threads.iter_mut() {
        if t.state == ThreadState::Ready {
            t.age = t.age.saturating_add(1);
        }
    }
}

struct Table {
    threads: [ThreadSlot; THREADS_MAX],
}

impl Table {
    fn new() -> Self {
        Self {
            threads: core::array::from_fn(|i| ThreadSlot::empty(ThreadId::new(i as u32))),
        }
    }
}

static TABLE: Spinlock<Option<Table>> = Spinlock::new(None);
static CURRENT: AtomicU32 = AtomicU32::new(IDLE_THREAD_ID as u32);
static EXIT_COND: CondVar = CondVar::new();
static RECLAIM_HOOK: Spinlock<Option<fn(u32)>> = Spinlock::new(None);

/// Registers the callback used to return a detached, terminated thread's
/// kernel stack to the kernel page pool (C3). Kept as a hook rather than a
/// direct call so this module does not depend on `mm`; the process manager
/// (C9) installs it once at boot.
pub fn set_stack_reclaim_hook(hook: fn(u32)) {
    *RECLAIM_HOOK.lock() = Some(hook);
}

/// Frees every detached thread's slot once it has terminated. A thread can
/// never free its own stack (it is still running on it), so reaping happens
/// lazily from whichever thread next calls `thread_yield`.
fn reap_detached(threads: &mut [ThreadSlot]) {
    for t in threads.iter_mut() {
        if t.state == ThreadState::Terminated && t.reap_policy == ReapPolicy::Detached {
            if let Some(stack) = t.stack.take() {
                if let Some(hook) = *RECLAIM_HOOK.lock() {
                    hook(stack);
                }
            }
            let tid = t.tid;
            *t = ThreadSlot::empty(tid);
        }
    }
}

/// Populates the thread table and marks slot 1 (the kernel-call service
/// thread) as the boot flow's own continuation, and slot 0 (idle) as
/// belonging to the kernel process but not yet runnable. The boot code
/// becomes the service thread in place, with no context switch needed to
/// start servicing kernel calls (C13); `seat_idle_thread` gives the idle
/// thread its own stack and entry point once one is available.
///
/// # Safety
/// Must run once, before any other `sched::` call, with interrupts disabled.
pub unsafe fn init() {
    let mut guard = TABLE.lock();
    let mut table = Table::new();
    table.threads[IDLE_THREAD_ID].pid = ProcessId::new(0);
    table.threads[SERVICE_THREAD_ID].state = ThreadState::Running;
    table.threads[SERVICE_THREAD_ID].pid = ProcessId::new(0);
    *guard = Some(table);
    CURRENT.store(SERVICE_THREAD_ID as u32, Ordering::SeqCst);
}

fn with_table<R>(f: impl FnOnce(&mut [ThreadSlot]) -> R) -> R {
    let mut guard = TABLE.lock();
    let table = guard.as_mut().expect("sched::init must run before any sched:: call");
    f(&mut table.threads)
}

pub fn current_thread_id() -> ThreadId {
    ThreadId::new(CURRENT.load(Ordering::SeqCst))
}

pub fn current_process_id() -> ProcessId {
    with_table(|t| t[current_thread_id().raw() as usize].pid)
}

/// Finds an `Available` slot, allocates its kernel stack, and seats it at
/// `entry` ready to run. Returns its `tid`.
pub fn thread_create(
    pid: ProcessId,
    entry: u32,
    stack_top: u32,
    stack_base: u32,
    code_sel: u16,
    data_sel: u16,
) -> KernelResult<ThreadId> {
    with_table(|threads| {
        let slot = threads
            .iter_mut()
            .find(|t| t.is_available())
            .ok_or(KernelError::Again {
                resource: "thread table",
            })?;
        slot.pid = pid;
        slot.age = 0;
        slot.quantum = DEFAULT_QUANTUM;
        slot.reap_policy = ReapPolicy::Joinable;
        slot.join_pending = false;
        slot.stack = Some(stack_base);
        slot.ctx = Context::new_thread(entry, stack_top, code_sel, data_sel);
        slot.state = ThreadState::Started;
        Ok(slot.tid)
    })
}

/// Seats the idle thread (C13/C8's reserved `IDLE_THREAD_ID` slot) at
/// `entry`, running in ring 0 on its own kernel stack, ready to be switched
/// to the first time the service thread blocks. Separate from
/// `thread_create` because the slot is pre-reserved by `init`, not drawn
/// from the `Available` pool, and never runs user code.
///
/// # Safety
/// Must run once, after `mm::init` has a kernel stack ready to hand over,
/// before the idle thread is ever switched to.
pub unsafe fn seat_idle_thread(entry: u32, stack_top: u32, stack_base: u32) {
    use crate::arch::x86::gdt::{KERNEL_CS, KERNEL_DS};
    with_table(|threads| {
        let slot = &mut threads[IDLE_THREAD_ID];
        slot.stack = Some(stack_base);
        slot.ctx = Context::new_thread(entry, stack_top, KERNEL_CS, KERNEL_DS);
        slot.state = ThreadState::Ready;
    });
}

/// Transitions a `Started` thread into the ready queue. Split from
/// `thread_create` so the process manager (C9) can finish installing the
/// thread's address space before it becomes schedulable.
pub fn thread_admit(tid: ThreadId) {
    with_table(|threads| {
        let slot = &mut threads[tid.raw() as usize];
        debug_assert_eq!(slot.state, ThreadState::Started);
        slot.state = ThreadState::Ready;
    });
}

/// Releases a terminated thread's slot. The stack itself is returned to the
/// caller so it can be handed back to the kernel page pool (C3); this module
/// does not depend on C3 directly.
pub fn thread_free(tid: ThreadId) -> KernelResult<Option<u32>> {
    with_table(|threads| {
        let slot = &mut threads[tid.raw() as usize];
        slot.require_terminated()?;
        let stack = slot.stack.take();
        *slot = ThreadSlot::empty(tid);
        Ok(stack)
    })
}

/// Detaches a thread so its slot auto-reaps on termination instead of
/// waiting for `thread_join`. Fails if another thread is already blocked in
/// `thread_join` on this `tid` (§9's join/detach race): letting the detach
/// through would hand the slot to `reap_detached` out from under the joiner,
/// which would then reread an unrelated, already-reused slot.
pub fn thread_detach(tid: ThreadId) -> KernelResult<()> {
    with_table(|threads| {
        let slot = &mut threads[tid.raw() as usize];
        if slot.reap_policy == ReapPolicy::Detached {
            return Err(KernelError::Inval {
                reason: "thread already detached",
            });
        }
        if slot.join_pending {
            return Err(KernelError::Inval {
                reason: "another thread is already joining this one",
            });
        }
        slot.reap_policy = ReapPolicy::Detached;
        Ok(())
    })
}

/// Blocks until `tid` terminates, then reaps its slot itself (the Open
/// Question resolution: `thread_join` both waits and reaps, rather than
/// requiring a follow-up `thread_free`). Marks the slot `join_pending` for
/// the duration so a concurrent `thread_detach` on the same `tid` is
/// rejected instead of racing this call's own reap.
pub fn thread_join(tid: ThreadId) -> KernelResult<Option<u32>> {
    loop {
        let done = with_table(|threads| {
            let slot = &mut threads[tid.raw() as usize];
            if slot.reap_policy == ReapPolicy::Detached {
                return Err(KernelError::Inval {
                    reason: "cannot join a detached thread",
                });
            }
            slot.join_pending = true;
            Ok(slot.state == ThreadState::Terminated)
        })?;
        if done {
            return thread_free(tid);
        }
        let guard = TABLE.lock();
        let _guard = EXIT_COND.wait(guard);
    }
}

/// Picks the highest-aged `Ready` thread, ages the rest, and switches to it.
/// Falls back to the idle thread if nothing is ready.
pub fn thread_yield() {
    let (prev_ctx, next_ctx, next_tid) = with_table(|threads| {
        reap_detached(threads);
        age_ready_threads(threads);
        let prev_tid = current_thread_id();
        let next_tid = select_next(threads).unwrap_or(ThreadId::new(IDLE_THREAD_ID as u32));

        if threads[prev_tid.raw() as usize].state == ThreadState::Running {
            threads[prev_tid.raw() as usize].state = ThreadState::Ready;
            threads[prev_tid.raw() as usize].age = 0;
        }
        threads[next_tid.raw() as usize].state = ThreadState::Running;
        threads[next_tid.raw() as usize].age = 0;
        threads[next_tid.raw() as usize].quantum = DEFAULT_QUANTUM;

        let prev_ctx = &mut threads[prev_tid.raw() as usize].ctx as *mut Context;
        let next_ctx = &threads[next_tid.raw() as usize].ctx as *const Context;
        (prev_ctx, next_ctx, next_tid)
    });

    if next_tid == current_thread_id() {
        return;
    }
    CURRENT.store(next_tid.raw(), Ordering::SeqCst);
    // SAFETY: both pointers name live `Context`s inside the thread table,
    // which outlives this call; the table lock is not held across the
    // switch (released at the end of the `with_table` closure above).
    unsafe {
        crate::arch::x86::entry::switch_context(prev_ctx, next_ctx);
    }
}

/// Parks the calling thread until `thread_wakeup` is called on it.
pub fn thread_sleep() {
    with_table(|threads| {
        let tid = current_thread_id();
        threads[tid.raw() as usize].state = ThreadState::Waiting;
    });
    thread_yield();
}

/// Marks a `Waiting` thread `Ready` again. No-op (not an error) if the
/// thread is not currently waiting, matching the original's tolerant
/// `thread_wakeup` contract used from interrupt context.
pub fn thread_wakeup(tid: ThreadId) {
    with_table(|threads| {
        let slot = &mut threads[tid.raw() as usize];
        if slot.state == ThreadState::Waiting {
            slot.state = ThreadState::Ready;
            slot.age = 0;
        }
    });
}

/// Puts every thread of `pid` other than the caller to sleep.
pub fn thread_sleep_all(pid: ProcessId) {
    let caller = current_thread_id();
    with_table(|threads| {
        for t in threads.iter_mut() {
            if t.pid == pid && t.tid != caller && t.state == ThreadState::Ready {
                t.state = ThreadState::Waiting;
            }
        }
    });
}

pub fn thread_wakeup_all(pid: ProcessId) {
    let tids: [Option<ThreadId>; THREADS_MAX] = with_table(|threads| {
        let mut out = [None; THREADS_MAX];
        for (slot, t) in out.iter_mut().zip(threads.iter()) {
            if t.pid == pid && t.state == ThreadState::Waiting {
                *slot = Some(t.tid);
            }
        }
        out
    });
    for tid in tids.into_iter().flatten() {
        thread_wakeup(tid);
    }
}

/// Terminates the calling thread. Does not return: the scheduler switches
/// away immediately and the terminated slot is reclaimed by `thread_join`
/// or, if detached, the next `thread_yield` pass.
pub fn thread_exit() -> ! {
    let tid = current_thread_id();
    with_table(|threads| {
        threads[tid.raw() as usize].state = ThreadState::Terminated;
    });
    EXIT_COND.broadcast();
    thread_yield();
    unreachable!("a Terminated thread is never selected by select_next");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(tid: u32, state: ThreadState, age: u32) -> ThreadSlot {
        let mut s = ThreadSlot::empty(ThreadId::new(tid));
        s.state = state;
        s.age = age;
        s
    }

    #[test]
    fn selects_highest_age_ready_thread() {
        let threads = [
            slot(0, ThreadState::Running, 0),
            slot(1, ThreadState::Ready, 3),
            slot(2, ThreadState::Ready, 7),
            slot(3, ThreadState::Waiting, 99),
        ];
        assert_eq!(select_next(&threads), Some(ThreadId::new(2)));
    }

    #[test]
    fn ties_break_to_lowest_tid() {
        let threads = [
            slot(0, ThreadState::Ready, 5),
            slot(1, ThreadState::Ready, 5),
        ];
        assert_eq!(select_next(&threads), Some(ThreadId::new(0)));
    }

    #[test]
    fn no_ready_thread_yields_none() {
        let threads = [slot(0, ThreadState::Running, 0), slot(1, ThreadState::Waiting, 0)];
        assert_eq!(select_next(&threads), None);
    }

    #[test]
    fn aging_increments_only_ready_threads() {
        let mut threads = [
            slot(0, ThreadState::Running, 1),
            slot(1, ThreadState::Ready, 1),
        ];
        age_ready_threads(&mut threads);
        assert_eq!(threads[0].age, 1);
        assert_eq!(threads[1].age, 2);
    }
}
