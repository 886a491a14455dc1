//! Process manager (C9): the fixed-size process table and its public
//! contract. Each process owns an address space (C4) and, in this nucleus,
//! exactly one thread (C8) — the "root thread" seated at the image loader's
//! reported entry point.

pub mod process;
pub mod table;

pub use process::{BootModule, ImageLoader, ProcessId, ProcessSlot, ProcessState, UnimplementedLoader};
pub use table::{
    process_create, process_exit, process_sleep, process_wakeup, process_yield, root_thread_of,
    with_vmem,
};

#[cfg(test)]
pub use process::test_loader;

/// # Safety
/// Must run once at boot, before `sched::init`.
pub unsafe fn init() {
    // SAFETY: delegated to this function's safety doc.
    unsafe {
        table::init();
    }
}
