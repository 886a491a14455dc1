//! Fixed-size process table and the public process manager contract (C9).

use crate::config::{PROCESS_MAX, USTACK_ADDR};
use crate::error::{KernelError, KernelResult};
use crate::mm::{Vmem, KPOOL};
use crate::process::process::{BootModule, ImageLoader, ProcessId, ProcessSlot, ProcessState};
use crate::sched::{self, ThreadId};
use crate::sync::Spinlock;

struct Table {
    slots: [ProcessSlot; PROCESS_MAX],
}

impl Table {
    fn new() -> Self {
        Self {
            slots: core::array::from_fn(|i| ProcessSlot::empty(ProcessId::new(i as u32))),
        }
    }
}

static TABLE: Spinlock<Option<Table>> = Spinlock::new(None);

/// # Safety
/// Must run once at boot, after `mm::init` has built the root vmem.
pub unsafe fn init() {
    let mut guard = TABLE.lock();
    let mut table = Table::new();
    table.slots[ProcessId::KERNEL.raw() as usize].state = ProcessState::Active;
    *guard = Some(table);
    drop(guard);
    sched::set_stack_reclaim_hook(|ptr| {
        let _ = KPOOL.put(ptr as *mut u8);
    });
}

fn with_table<R>(f: impl FnOnce(&mut [ProcessSlot]) -> R) -> R {
    let mut guard = TABLE.lock();
    let table = guard
        .as_mut()
        .expect("process::init must run before any process:: call");
    f(&mut table.slots)
}

/// Creates a process from a verified boot module: allocates a fresh `Vmem`,
/// hands it to `loader` to install the loadable segments, maps a user stack
/// page, and seats a root thread at the loader-reported entry point.
pub fn process_create(
    image: &BootModule<'_>,
    loader: &dyn ImageLoader,
    user_stack_frame: u32,
) -> KernelResult<ProcessId> {
    let pid = with_table(|slots| {
        slots
            .iter_mut()
            .find(|s| s.is_available())
            .map(|s| {
                s.state = ProcessState::Active;
                s.pid
            })
            .ok_or(KernelError::Again {
                resource: "process table",
            })
    })?;

    let mut vmem = Vmem::create(None)?;

    let entry = match loader.load(image, &mut vmem) {
        Ok(entry) => entry,
        Err(e) => {
            vmem.destroy();
            release_slot(pid);
            return Err(e);
        }
    };

    let stack_top = USTACK_ADDR as u32;
    if let Err(e) = vmem.map(
        stack_top - crate::config::PAGE_SIZE as u32,
        user_stack_frame,
        crate::config::PAGE_SIZE as u32,
        true,
        true,
    ) {
        vmem.destroy();
        release_slot(pid);
        return Err(e);
    }

    let kstack = match KPOOL.get(true) {
        Ok(ptr) => ptr as u32,
        Err(e) => {
            vmem.destroy();
            release_slot(pid);
            return Err(e);
        }
    };
    let tid = match sched::thread_create(
        pid,
        entry,
        stack_top,
        kstack,
        crate::arch::x86::gdt::USER_CS,
        crate::arch::x86::gdt::USER_DS,
    ) {
        Ok(tid) => tid,
        Err(e) => {
            let _ = KPOOL.put(kstack as *mut u8);
            vmem.destroy();
            release_slot(pid);
            return Err(e);
        }
    };
    sched::thread_admit(tid);

    with_table(|slots| {
        let slot = &mut slots[pid.raw() as usize];
        slot.vmem = Some(vmem);
        slot.root_thread = Some(tid);
    });

    Ok(pid)
}

fn release_slot(pid: ProcessId) {
    with_table(|slots| {
        slots[pid.raw() as usize] = ProcessSlot::empty(pid);
    });
}

/// Tears down a process: frees its vmem, marks its root thread detached so
/// the scheduler reclaims the kernel stack once it stops running, wakes
/// anything sleeping on this process, and frees the slot. Called on behalf
/// of a thread that is about to call `sched::thread_exit`, not after.
pub fn process_exit(pid: ProcessId) {
    let (vmem, root_thread) = with_table(|slots| {
        let slot = &mut slots[pid.raw() as usize];
        (slot.vmem.take(), slot.root_thread.take())
    });
    if let Some(vmem) = vmem {
        vmem.destroy();
    }
    if let Some(tid) = root_thread {
        let _ = sched::thread_detach(tid);
    }
    sched::thread_wakeup_all(pid);
    release_slot(pid);
}

pub fn process_yield() {
    sched::thread_yield();
}

pub fn process_sleep() {
    sched::thread_sleep();
}

pub fn process_wakeup(pid: ProcessId) {
    sched::thread_wakeup_all(pid);
}

pub fn root_thread_of(pid: ProcessId) -> Option<ThreadId> {
    with_table(|slots| slots[pid.raw() as usize].root_thread)
}

/// Runs `f` against `pid`'s address space, if it has one. Used by the
/// kernel-call dispatcher (C10) to validate a user-supplied pointer lies in
/// the calling process's own mapped range before trusting it.
pub fn with_vmem<R>(pid: ProcessId, f: impl FnOnce(&mut Vmem) -> R) -> Option<R> {
    with_table(|slots| slots[pid.raw() as usize].vmem.as_mut().map(f))
}
