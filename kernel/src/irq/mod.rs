//! Exception and interrupt dispatch (C6): static `{handler, name}` tables
//! indexed by vector/IRQ number, separate from `arch::x86::lpic` (the 8259
//! driver itself). Grounded on the original implementation's
//! `exceptions[]`/`do_exception` dispatch, generalized from a fixed C array
//! of function pointers to a table of `Option<fn>` slots.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::x86::context::Context;
use crate::config::{EXCEPTIONS_NUM, INTERRUPT_SPURIOUS_THRESHOLD, IRQS_NUM};
use crate::sync::Spinlock;

pub type ExceptionHandler = fn(num: u8, ctx: &Context);
pub type InterruptHandler = fn(irq: u8);

struct ExceptionSlot {
    handler: Option<ExceptionHandler>,
    name: &'static str,
}

const EXCEPTION_NAMES: [&str; EXCEPTIONS_NUM] = [
    "divide-by-zero",
    "debug",
    "nmi",
    "breakpoint",
    "overflow",
    "bound-range",
    "invalid-opcode",
    "device-not-available",
    "double-fault",
    "coprocessor-segment-overrun",
    "invalid-tss",
    "segment-not-present",
    "stack-fault",
    "general-protection",
    "page-fault",
    "reserved-15",
    "x87-fp",
    "alignment-check",
    "machine-check",
    "simd-fp",
    "virtualization",
    "control-protection",
    "reserved-22",
    "reserved-23",
    "reserved-24",
    "reserved-25",
    "reserved-26",
    "reserved-27",
    "hypervisor-injection",
    "vmm-communication",
    "security",
    "reserved-31",
];

static EXCEPTIONS: Spinlock<[ExceptionSlot; EXCEPTIONS_NUM]> = Spinlock::new({
    const EMPTY: ExceptionSlot = ExceptionSlot {
        handler: None,
        name: "",
    };
    let mut slots = [EMPTY; EXCEPTIONS_NUM];
    let mut i = 0;
    while i < EXCEPTIONS_NUM {
        slots[i].name = EXCEPTION_NAMES[i];
        i += 1;
    }
    slots
});

static INTERRUPTS: Spinlock<[Option<InterruptHandler>; IRQS_NUM]> = Spinlock::new([None; IRQS_NUM]);
static SPURIOUS_COUNT: AtomicU32 = AtomicU32::new(0);

/// Prints the faulting context and panics. Installed as every exception
/// slot's handler until something registers its own.
fn default_handler(num: u8, ctx: &Context) {
    log::error!(
        "unhandled exception {num} ({}) at eip=0x{:08x}",
        EXCEPTION_NAMES.get(num as usize).copied().unwrap_or("unknown"),
        ctx.eip
    );
    crate::kpanic!("unhandled exception");
}

/// Fills every slot with [`default_handler`]. Idempotent: a slot already
/// given a custom handler by an earlier init stage is left alone.
pub fn init() {
    let mut guard = EXCEPTIONS.lock();
    for slot in guard.iter_mut() {
        if slot.handler.is_none() {
            slot.handler = Some(default_handler);
        }
    }
}

/// Installs `handler` for exception `num`. Refuses to overwrite a
/// non-default handler, logging a warning instead — matching the original's
/// `exception_register` contract.
pub fn exception_register(num: u8, handler: ExceptionHandler) {
    let mut guard = EXCEPTIONS.lock();
    let slot = &mut guard[num as usize];
    if slot.handler.is_some() && slot.handler != Some(default_handler) {
        log::warn!("overwriting exception handler for {}", slot.name);
    }
    slot.handler = Some(handler);
}

/// Restores exception `num` to [`default_handler`].
pub fn exception_unregister(num: u8) {
    EXCEPTIONS.lock()[num as usize].handler = Some(default_handler);
}

/// Looks up and calls exception `num`'s handler with the trapped context.
pub fn do_exception(num: u8, ctx: &Context) {
    let handler = EXCEPTIONS.lock()[num as usize].handler.unwrap_or(default_handler);
    handler(num, ctx);
}

/// Installs `handler` for IRQ line `irq`.
pub fn interrupt_register(irq: u8, handler: InterruptHandler) {
    INTERRUPTS.lock()[irq as usize] = Some(handler);
}

pub fn interrupt_unregister(irq: u8) {
    INTERRUPTS.lock()[irq as usize] = None;
}

/// Acknowledges `irq`, raises the LPIC level to mask it and anything below,
/// dispatches its handler (or counts a spurious interrupt), then restores
/// the prior level. Acknowledging before dispatch lets a handler that
/// re-enables interrupts be preempted by something higher priority.
pub fn do_interrupt(irq: u8) {
    let lpic = crate::arch::x86::lpic();
    lpic.lock().ack(irq);
    let prev_level = lpic.lock().lvl_set(irq as usize + 1);

    match INTERRUPTS.lock()[irq as usize] {
        Some(handler) => handler(irq),
        None => {
            let n = SPURIOUS_COUNT.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= INTERRUPT_SPURIOUS_THRESHOLD {
                log::warn!("spurious IRQ {irq} (count={n})");
            } else {
                log::debug!("spurious IRQ {irq} (count={n})");
            }
        }
    }

    lpic.lock().lvl_set(prev_level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicBool;

    #[test]
    fn unregistered_exception_reports_as_default() {
        EXCEPTIONS.lock()[5].handler = None;
        init();
        assert_eq!(EXCEPTIONS.lock()[5].handler, Some(default_handler));
    }

    #[test]
    fn custom_exception_handler_is_dispatched() {
        static CALLED: AtomicBool = AtomicBool::new(false);
        fn handler(_num: u8, _ctx: &Context) {
            CALLED.store(true, Ordering::SeqCst);
        }
        exception_register(3, handler);
        do_exception(3, &Context::default());
        assert!(CALLED.load(Ordering::SeqCst));
        exception_unregister(3);
    }

    #[test]
    fn custom_interrupt_handler_is_dispatched() {
        static CALLED: AtomicBool = AtomicBool::new(false);
        fn handler(_irq: u8) {
            CALLED.store(true, Ordering::SeqCst);
        }
        interrupt_register(1, handler);
        do_interrupt(1);
        assert!(CALLED.load(Ordering::SeqCst));
        interrupt_unregister(1);
    }
}
