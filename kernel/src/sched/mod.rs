//! Process/thread scheduler (C8): fixed-size thread table, cooperative
//! round-robin with aging, and the voluntary yield/sleep/wakeup primitives
//! every blocking operation in this nucleus is built on.

pub mod scheduler;
pub mod thread;

pub use scheduler::{
    age_ready_threads, current_process_id, current_thread_id, seat_idle_thread, select_next,
    set_stack_reclaim_hook, thread_admit, thread_create, thread_detach, thread_exit, thread_free,
    thread_join, thread_sleep, thread_sleep_all, thread_wakeup, thread_wakeup_all, thread_yield,
};
pub use thread::{ReapPolicy, ThreadId, ThreadSlot, ThreadState};

/// # Safety
/// Must run once at boot, after `process::init` has created the kernel
/// process slot that the idle and service threads are attributed to.
pub unsafe fn init() {
    // SAFETY: delegated to this function's safety doc.
    unsafe {
        scheduler::init();
    }
}
