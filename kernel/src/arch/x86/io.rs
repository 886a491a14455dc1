//! Arch primitives (C1): port I/O, interrupt masking, TLB control, and the
//! atomic building blocks C7's sync primitives are built on.
//!
//! These are leaf operations: none of them fail except "unsupported on this
//! host", which on the bare-metal target is simply not possible and on the
//! host test build is handled by the `#[cfg(not(target_os = "none"))]` stubs
//! below.

#[cfg(target_os = "none")]
use core::arch::asm;

/// Writes 8 bits to an I/O port.
#[cfg(target_os = "none")]
#[inline(always)]
pub unsafe fn outb(port: u16, val: u8) {
    // SAFETY: caller guarantees `port` names a valid, writable I/O port for
    // the intended device.
    unsafe {
        asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
}

/// Reads 8 bits from an I/O port.
#[cfg(target_os = "none")]
#[inline(always)]
pub unsafe fn inb(port: u16) -> u8 {
    let val: u8;
    // SAFETY: caller guarantees `port` names a valid, readable I/O port.
    unsafe {
        asm!("in al, dx", out("al") val, in("dx") port, options(nomem, nostack, preserves_flags));
    }
    val
}

/// Gives the bus a moment to settle after a port write, as the original
/// implementation does by writing a throwaway byte to port 0x80.
#[cfg(target_os = "none")]
#[inline(always)]
pub fn iowait() {
    // SAFETY: port 0x80 is conventionally unused POST-code scratch space;
    // writing to it has no architectural effect beyond consuming a bus cycle.
    unsafe {
        asm!("out 0x80, al", in("al") 0u8, options(nomem, nostack, preserves_flags));
    }
}

/// Halts the CPU until the next interrupt.
#[cfg(target_os = "none")]
#[inline(always)]
pub fn hlt() {
    // SAFETY: `hlt` is always a valid instruction in kernel mode.
    unsafe {
        asm!("hlt", options(nomem, nostack, preserves_flags));
    }
}

/// Disables maskable interrupts, returning whether they were previously enabled.
#[cfg(target_os = "none")]
#[inline(always)]
pub fn disable_interrupts() -> bool {
    let flags: usize;
    // SAFETY: `pushfd`/`pop` only reads CPU state; `cli` only affects IF.
    unsafe {
        asm!(
            "pushfd",
            "pop {flags}",
            "cli",
            flags = out(reg) flags,
            options(nomem, preserves_flags)
        );
    }
    (flags & (1 << 9)) != 0
}

/// Restores the interrupt-enable flag to `enabled`.
#[cfg(target_os = "none")]
#[inline(always)]
pub fn restore_interrupts(enabled: bool) {
    if enabled {
        // SAFETY: `sti` only affects the interrupt-enable flag.
        unsafe { asm!("sti", options(nomem, nostack, preserves_flags)) };
    }
}

/// Loads a page directory physical address into CR3 and enables paging (sets
/// `CR0.PG`). This is the "turn on the MMU" operation; it is irreversible
/// for the life of the system.
///
/// # Safety
/// `pgdir_phys` must point to a valid, fully-populated page directory whose
/// kernel half maps the currently executing code and the stack in use.
#[cfg(target_os = "none")]
pub unsafe fn tlb_load(pgdir_phys: u32) {
    // SAFETY: delegated to the caller per this function's safety doc.
    unsafe {
        asm!(
            "mov cr3, {pgdir}",
            "mov {tmp}, cr0",
            "or {tmp}, 0x80000000",
            "mov cr0, {tmp}",
            pgdir = in(reg) pgdir_phys,
            tmp = out(reg) _,
            options(nostack)
        );
    }
}

/// Reloads CR3 with its current value, flushing all non-global TLB entries.
#[cfg(target_os = "none")]
pub fn tlb_flush() {
    // SAFETY: re-reading and re-writing CR3 is always valid once paging is on.
    unsafe {
        asm!(
            "mov {tmp}, cr3",
            "mov cr3, {tmp}",
            tmp = out(reg) _,
            options(nostack)
        );
    }
}

/// Issues a `pause` hint inside a spin loop, so a contended spinlock doesn't
/// starve the core's memory-ordering machinery.
#[cfg(target_os = "none")]
#[inline(always)]
pub fn pause() {
    // SAFETY: `pause` is a no-op hint with no side effects other than timing.
    unsafe {
        asm!("pause", options(nomem, nostack, preserves_flags));
    }
}

/// Invalidates the data cache. On x86 the cache is coherent with DMA for the
/// ranges this kernel manages, so this is a compiler fence rather than a
/// real flush instruction; kept as a named primitive so callers do not need
/// to know that.
#[inline(always)]
pub fn dcache_invalidate() {
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

#[cfg(not(target_os = "none"))]
mod host_stubs {
    //! Host test build: no real hardware exists, so every leaf here is a
    //! harmless recorder instead of real port I/O / privileged instructions.
    use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

    static INTERRUPTS_ENABLED: AtomicBool = AtomicBool::new(true);
    static LAST_OUTB: AtomicU8 = AtomicU8::new(0);

    pub unsafe fn outb(_port: u16, val: u8) {
        LAST_OUTB.store(val, Ordering::Relaxed);
    }

    pub unsafe fn inb(_port: u16) -> u8 {
        LAST_OUTB.load(Ordering::Relaxed)
    }

    pub fn iowait() {}

    pub fn hlt() {}

    pub fn disable_interrupts() -> bool {
        INTERRUPTS_ENABLED.swap(false, Ordering::SeqCst)
    }

    pub fn restore_interrupts(enabled: bool) {
        INTERRUPTS_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub unsafe fn tlb_load(_pgdir_phys: u32) {}

    pub fn tlb_flush() {}

    pub fn pause() {
        core::hint::spin_loop();
    }
}

#[cfg(not(target_os = "none"))]
pub use host_stubs::*;

/// An interrupt-masking guard: disables interrupts on construction, restores
/// the prior state on drop. Used by every subsystem that must run a short
/// critical section without being preempted by a hardware IRQ.
pub struct IrqGuard {
    was_enabled: bool,
}

impl IrqGuard {
    #[inline]
    pub fn new() -> Self {
        Self {
            was_enabled: disable_interrupts(),
        }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    #[inline]
    fn drop(&mut self) {
        restore_interrupts(self.was_enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq_guard_restores_prior_state() {
        restore_interrupts(true);
        {
            let _g = IrqGuard::new();
            assert!(!disable_interrupts());
        }
        assert!(disable_interrupts());
        restore_interrupts(true);
    }
}
