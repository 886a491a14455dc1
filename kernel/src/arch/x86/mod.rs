//! x86 (i386, 32-bit protected mode) architecture primitives: C1 and C5.

pub mod context;
pub mod entry;
pub mod gdt;
pub mod idt;
pub mod io;
pub mod lpic;
pub mod mmu;

use spin::Mutex;

use crate::config::KCALL_TRAP_VECTOR;

// Descriptor tables are boot-time-initialized, never-reallocated globals, in
// keeping with the original implementation's single global GDT/IDT. They are
// `static mut` rather than behind a lock because after `init()` they are
// read-only for the life of the system (only `set_kernel_stack` on the TSS
// mutates live state, and that is reached through `gdt()` below instead).
static mut GDT: gdt::Gdt = gdt::Gdt::new();
static mut IDT: idt::Idt = idt::Idt::new();
static LPIC: Mutex<lpic::Lpic> = Mutex::new(lpic::Lpic::new());

/// Installs the GDT/TSS, wires the IDT's exception, IRQ, and kcall-trap
/// gates, and remaps the PIC. Matches C13's `hal_init -> gdt_init -> idt_init
/// -> tss_init -> lpic_init` stage order.
///
/// # Safety
/// Must run exactly once, early at boot, before interrupts are enabled.
pub unsafe fn init() {
    // SAFETY: boot-time, single-threaded, no prior descriptor tables depend
    // on the ones being replaced here; `GDT`/`IDT` are `'static` for the
    // life of the kernel image.
    unsafe {
        #[allow(static_mut_refs)]
        let gdt_ref: &'static mut gdt::Gdt = &mut GDT;
        gdt_ref.init();

        #[allow(static_mut_refs)]
        let idt_ref: &'static mut idt::Idt = &mut IDT;
        for vector in 0u8..32 {
            idt_ref.set_interrupt_gate(vector, entry::exception_stub_address(vector));
        }
        for vector in 32u8..48 {
            idt_ref.set_interrupt_gate(vector, entry::irq_stub_address(vector - 32));
        }
        idt_ref.set_trap_gate_dpl3(KCALL_TRAP_VECTOR, entry::kcall_stub_address());
        idt_ref.load();

        LPIC.lock().setup(0x20, 0x28);
    }
}

pub fn lpic() -> &'static Mutex<lpic::Lpic> {
    &LPIC
}

/// The platform halt routine installed into [`crate::error::set_halt`]:
/// parks the CPU in a `hlt` loop forever. Never returns.
pub fn halt_loop() -> ! {
    loop {
        io::hlt();
    }
}

/// Returns the live TSS for updating the ring-0 stack pointer on context
/// switch.
///
/// # Safety
/// Caller must not retain the reference past the current context switch and
/// must not call this reentrantly from two threads (single-CPU, cooperative
/// scheduling already guarantees this).
pub unsafe fn tss_mut() -> &'static mut gdt::Tss {
    // SAFETY: delegated to this function's safety doc.
    unsafe {
        #[allow(static_mut_refs)]
        GDT.tss_mut()
    }
}
