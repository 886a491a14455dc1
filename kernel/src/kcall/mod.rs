//! Kernel-call dispatcher (C10): the single scoreboard and dedicated
//! service thread every user-mode-to-kernel transition funnels through.
//!
//! `do_kcall` runs on the calling user thread's own kernel stack (the trap
//! stub's context); it is the only place outside the service thread that
//! touches the scoreboard, and it touches it only before `kernel_sem.up()`
//! and after `user_sem.down()` returns — so the two semaphores alone
//! serialize access without an extra lock. The service thread never issues
//! a kernel call itself: doing so would park it in its own `kernel_sem.up`
//! wait queue forever, since only the service thread ever drains that
//! queue.

pub mod handlers;
pub mod table;
pub mod vmhandle;

use handlers::KcallArgs;
use table::Kcall;

use crate::error::KernelError;
use crate::sync::{Semaphore, Spinlock};

struct Scoreboard {
    kcall_nr: usize,
    args: KcallArgs,
    ret: isize,
}

static SCOREBOARD: Spinlock<Scoreboard> = Spinlock::new(Scoreboard {
    kcall_nr: 0,
    args: [0; 5],
    ret: 0,
});
static KERNEL_SEM: Semaphore = Semaphore::new(0);
static USER_SEM: Semaphore = Semaphore::new(0);

type Handler = fn(KcallArgs) -> crate::error::KernelResult<u32>;

fn dispatch(kcall: Kcall, args: KcallArgs) -> crate::error::KernelResult<u32> {
    let handler: Handler = match kcall {
        Kcall::Void0 | Kcall::Void1 | Kcall::Void2 | Kcall::Void3 | Kcall::Void4 | Kcall::Void5 => {
            handlers::void
        }
        Kcall::Shutdown => handlers::shutdown,
        Kcall::Write => handlers::write,
        Kcall::Fralloc => handlers::fralloc,
        Kcall::Frfree => handlers::frfree,
        Kcall::Vmcreate => handlers::vmcreate,
        Kcall::Vmremove => handlers::vmremove,
        Kcall::Vmmap => handlers::vmmap,
        Kcall::Vmunmap => handlers::vmunmap,
        Kcall::Vmctrl => handlers::vmctrl,
        Kcall::Vminfo => handlers::vminfo,
        Kcall::KmodGet => handlers::kmod_get,
        Kcall::Spawn => handlers::spawn,
        Kcall::Semget => handlers::semget,
        Kcall::Semop => handlers::semop,
        Kcall::Semctl => handlers::semctl,
        Kcall::ThreadGetId => handlers::thread_get_id,
        Kcall::ThreadCreate => handlers::thread_create,
        Kcall::ThreadExit => handlers::thread_exit,
        Kcall::ThreadYield => handlers::thread_yield,
        Kcall::MailboxTag => handlers::mailbox_tag,
        Kcall::ThreadJoin => handlers::thread_join,
        Kcall::ThreadDetach => handlers::thread_detach,
        Kcall::Pinfo => handlers::pinfo,
    };
    log::trace!("kcall dispatch: nr={kcall:?} args={args:?}");
    handler(args)
}

/// Proof that the caller is running the user-trap entry path, not the
/// service thread. `do_kcall` requires one by value; the only way to get one
/// is [`UserTrapToken::from_trap`], called solely from `kcall_trap_entry`.
/// The service thread's own code path calls [`dispatch`] directly and never
/// constructs a token, so it can never reach `do_kcall` and deadlock itself
/// waiting on the request it would otherwise be the only one draining.
pub struct UserTrapToken(());

impl UserTrapToken {
    /// # Safety
    /// Must only be called on the genuine user-trap entry path — i.e. from
    /// `kcall_trap_entry`, once per trapped kernel call, never from the
    /// service thread's own execution context.
    unsafe fn from_trap() -> Self {
        UserTrapToken(())
    }
}

/// The trap stub's entry point: writes the request into the scoreboard,
/// wakes the service thread, and parks until it replies. Runs on the
/// calling user thread's kernel stack.
pub fn do_kcall(_token: UserTrapToken, kcall_nr: usize, args: KcallArgs) -> isize {
    {
        let mut guard = SCOREBOARD.lock();
        guard.kcall_nr = kcall_nr;
        guard.args = args;
    }
    KERNEL_SEM.up();
    USER_SEM.down();
    SCOREBOARD.lock().ret
}

/// Called by the kernel-call trap stub (vector [`crate::config::KCALL_TRAP_VECTOR`])
/// with the interrupted user thread's saved registers: `eax` is the kcall
/// number, `ebx/ecx/edx/esi/edi` are its five arguments. Writes the result
/// back into `ctx.eax`, where the stub's `iret` returns it to the caller.
#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn kcall_trap_entry(ctx: &mut crate::arch::x86::context::Context) {
    let args: KcallArgs = [ctx.ebx, ctx.ecx, ctx.edx, ctx.esi, ctx.edi];
    // SAFETY: this function is the trap-entry path; it runs once per trapped
    // kernel call and never on the service thread's own stack.
    let token = unsafe { UserTrapToken::from_trap() };
    ctx.eax = do_kcall(token, ctx.eax as usize, args) as u32;
}

/// The service thread's body (C8 slot `SERVICE_THREAD_ID`): forever waits
/// for a request, dispatches it, and wakes the caller. Must never itself
/// issue a kernel call.
pub fn handle_kcall_loop() -> ! {
    loop {
        KERNEL_SEM.down();
        let (kcall_nr, args) = {
            let guard = SCOREBOARD.lock();
            (guard.kcall_nr, guard.args)
        };
        let result = match Kcall::try_from(kcall_nr) {
            Ok(kcall) => dispatch(kcall, args),
            Err(e) => Err(e),
        };
        let ret = match result {
            Ok(v) => v as isize,
            Err(e) => e.errno(),
        };
        SCOREBOARD.lock().ret = ret;
        USER_SEM.up();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_kcalls_return_zero() {
        assert_eq!(dispatch(Kcall::Void0, [0; 5]).unwrap(), 0);
    }

    #[test]
    fn fralloc_then_frfree_round_trips() {
        crate::mm::FRAMES.init(&[crate::mm::MemRegion {
            base: crate::config::USER_BASE_PHYS as u32,
            size: 16 * crate::config::PAGE_SIZE as u32,
            kind: crate::mm::RegionKind::Available,
        }]);
        let frame = dispatch(Kcall::Fralloc, [0; 5]).unwrap();
        dispatch(Kcall::Frfree, [frame, 0, 0, 0, 0]).unwrap();
    }

    #[test]
    fn unregistered_kcall_number_is_nosys() {
        let err = Kcall::try_from(table::KCALL_MAX).unwrap_err();
        assert_eq!(err, KernelError::Nosys { kcall_nr: table::KCALL_MAX });
    }

    #[test]
    fn kmod_get_reads_installed_module_base_and_size() {
        let mut info = crate::kargs::BootInfo::empty();
        info.kmod_register(0x0040_0000, 8192, "init");
        crate::kargs::install_modules(info.modules());

        assert_eq!(dispatch(Kcall::KmodGet, [0, 0, 0, 0, 0]).unwrap(), 0x0040_0000);
        assert_eq!(dispatch(Kcall::KmodGet, [0, 1, 0, 0, 0]).unwrap(), 8192);
        assert!(dispatch(Kcall::KmodGet, [9, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn semget_semop_round_trip() {
        let handle = dispatch(Kcall::Semget, [1, 0, 0, 0, 0]).unwrap();
        assert_eq!(dispatch(Kcall::Semop, [handle, 0, 0, 0, 0]).unwrap(), 0); // down
        assert_eq!(dispatch(Kcall::Semop, [handle, 2, 0, 0, 0]).unwrap(), 0); // try_down fails
        assert_eq!(dispatch(Kcall::Semop, [handle, 1, 0, 0, 0]).unwrap(), 0); // up
    }
}
