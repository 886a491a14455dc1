//! Kernel-call handlers (C10). Each runs in the service thread's kernel
//! context, trusts its arguments only after validation, and returns a
//! [`KernelResult<u32>`] the dispatcher flattens to the signed ABI word.

use crate::config::PAGE_SIZE;
use crate::error::KernelResult;
use crate::kcall::vmhandle;
use crate::mm::FRAMES;
use crate::sched::{self, ThreadId};
use crate::sync::Semaphore;

pub type KcallArgs = [u32; 5];

const SEM_MAX: usize = 16;
static SEMAPHORES: [Semaphore; SEM_MAX] = {
    const S: Semaphore = Semaphore::new(0);
    [S; SEM_MAX]
};
static SEM_INUSE: crate::sync::Spinlock<[bool; SEM_MAX]> = crate::sync::Spinlock::new([false; SEM_MAX]);

/// Confirms every page in `[vaddr, vaddr+len)` is mapped into the calling
/// process's address space before a handler dereferences it. A process with
/// no address space of its own (the kernel process) is never a valid caller
/// of a user-pointer kcall.
fn validate_user_range(vaddr: u32, len: u32) -> KernelResult<()> {
    let pid = sched::current_process_id();
    let first_page = vaddr - (vaddr % PAGE_SIZE as u32);
    let last = vaddr.checked_add(len).ok_or_else(|| crate::kernel_error!(Fault, vaddr as usize))?;
    let mut page = first_page;
    while page < last {
        let mapped = crate::process::with_vmem(pid, |v| v.info(page).is_ok()).unwrap_or(false);
        if !mapped {
            return Err(crate::kernel_error!(Fault, page as usize));
        }
        page += PAGE_SIZE as u32;
    }
    Ok(())
}

pub fn void(_args: KcallArgs) -> KernelResult<u32> {
    Ok(0)
}

pub fn shutdown(_args: KcallArgs) -> KernelResult<u32> {
    log::info!("kcall: shutdown requested");
    crate::error::halt_now()
}

pub fn write(args: KcallArgs) -> KernelResult<u32> {
    let (vaddr, len) = (args[0], args[1]);
    validate_user_range(vaddr, len)?;
    // SAFETY: `validate_user_range` confirmed every page in this span is
    // mapped into the calling process's own address space.
    let bytes = unsafe { core::slice::from_raw_parts(vaddr as *const u8, len as usize) };
    crate::klog::klog_write(bytes);
    Ok(len)
}

pub fn fralloc(_args: KcallArgs) -> KernelResult<u32> {
    FRAMES.alloc()
}

pub fn frfree(args: KcallArgs) -> KernelResult<u32> {
    FRAMES.free(args[0])?;
    Ok(0)
}

pub fn vmcreate(_args: KcallArgs) -> KernelResult<u32> {
    vmhandle::create()
}

pub fn vmremove(args: KcallArgs) -> KernelResult<u32> {
    vmhandle::remove(args[0])?;
    Ok(0)
}

pub fn vmmap(args: KcallArgs) -> KernelResult<u32> {
    let (handle, vaddr, frame, writable, user) = (args[0], args[1], args[2], args[3] != 0, args[4] != 0);
    vmhandle::with(handle, |v| v.map(vaddr, frame, PAGE_SIZE as u32, writable, user))??;
    Ok(0)
}

pub fn vmunmap(args: KcallArgs) -> KernelResult<u32> {
    vmhandle::with(args[0], |v| v.unmap(args[1]))?
}

pub fn vmctrl(args: KcallArgs) -> KernelResult<u32> {
    let (handle, vaddr, writable, user) = (args[0], args[1], args[2] != 0, args[3] != 0);
    vmhandle::with(handle, |v| v.ctrl(vaddr, writable, user))??;
    Ok(0)
}

pub fn vminfo(args: KcallArgs) -> KernelResult<u32> {
    let info = vmhandle::with(args[0], |v| v.info(args[1]))??;
    Ok(info.frame)
}

/// `args[0]` is the module index, `args[1]` selects which field to return:
/// `0` for its physical base address, `1` for its size in bytes. Reading a
/// module's command line is not exposed here (it would need a user buffer
/// pointer and length threaded through, which this kcall's argument layout
/// does not carry); the base/size pair is enough for a loader to map it in.
pub fn kmod_get(args: KcallArgs) -> KernelResult<u32> {
    let index = args[0] as usize;
    let module = crate::kargs::module_at(index)
        .ok_or_else(|| crate::kernel_error!(Inval, "kmod_get: no module at that index"))?;
    match args[1] {
        0 => Ok(module.base),
        1 => Ok(module.size),
        _ => Err(crate::kernel_error!(Inval, "kmod_get: unknown field selector")),
    }
}

pub fn spawn(_args: KcallArgs) -> KernelResult<u32> {
    Err(crate::kernel_error!(Nosys, 17))
}

pub fn semget(args: KcallArgs) -> KernelResult<u32> {
    let initial = args[0] as i64;
    let mut guard = SEM_INUSE.lock();
    let idx = guard
        .iter()
        .position(|&used| !used)
        .ok_or_else(|| crate::kernel_error!(Again, "semaphore table"))?;
    guard[idx] = true;
    drop(guard);
    for _ in 0..initial {
        SEMAPHORES[idx].up();
    }
    Ok(idx as u32)
}

pub fn semop(args: KcallArgs) -> KernelResult<u32> {
    let (handle, op) = (args[0] as usize, args[1]);
    if handle >= SEM_MAX || !SEM_INUSE.lock()[handle] {
        return Err(crate::kernel_error!(Inval, "semop on an unallocated semaphore handle"));
    }
    match op {
        0 => {
            SEMAPHORES[handle].down();
            Ok(0)
        }
        1 => {
            SEMAPHORES[handle].up();
            Ok(0)
        }
        2 => Ok(SEMAPHORES[handle].try_down() as u32),
        _ => Err(crate::kernel_error!(Inval, "semop: unknown opcode")),
    }
}

pub fn semctl(args: KcallArgs) -> KernelResult<u32> {
    let handle = args[0] as usize;
    if handle >= SEM_MAX || !SEM_INUSE.lock()[handle] {
        return Err(crate::kernel_error!(Inval, "semctl on an unallocated semaphore handle"));
    }
    Ok(SEMAPHORES[handle].value() as u32)
}

pub fn thread_get_id(_args: KcallArgs) -> KernelResult<u32> {
    Ok(sched::current_thread_id().raw())
}

pub fn thread_create(args: KcallArgs) -> KernelResult<u32> {
    let (entry, stack_top) = (args[0], args[1]);
    let pid = sched::current_process_id();
    let kstack = crate::mm::KPOOL.get(true)? as u32;
    let tid = sched::thread_create(
        pid,
        entry,
        stack_top,
        kstack,
        crate::arch::x86::gdt::USER_CS,
        crate::arch::x86::gdt::USER_DS,
    );
    match tid {
        Ok(tid) => {
            sched::thread_admit(tid);
            Ok(tid.raw())
        }
        Err(e) => {
            let _ = crate::mm::KPOOL.put(kstack as *mut u8);
            Err(e)
        }
    }
}

/// The nucleus's process model seats exactly one root thread per process
/// (C9), so an exiting thread always ends its owning process. Never
/// actually returns (`sched::thread_exit` is `-> !`); typed to return
/// `KernelResult<u32>` only so it fits the dispatch table's handler shape.
pub fn thread_exit(_args: KcallArgs) -> KernelResult<u32> {
    crate::process::process_exit(sched::current_process_id());
    sched::thread_exit()
}

pub fn thread_yield(_args: KcallArgs) -> KernelResult<u32> {
    sched::thread_yield();
    Ok(0)
}

pub fn thread_join(args: KcallArgs) -> KernelResult<u32> {
    sched::thread_join(ThreadId::new(args[0]))?;
    Ok(0)
}

pub fn thread_detach(args: KcallArgs) -> KernelResult<u32> {
    sched::thread_detach(ThreadId::new(args[0]))?;
    Ok(0)
}

pub fn pinfo(_args: KcallArgs) -> KernelResult<u32> {
    Ok(sched::current_process_id().raw())
}

pub fn mailbox_tag(_args: KcallArgs) -> KernelResult<u32> {
    Err(crate::kernel_error!(Nosys, 25))
}
