//! Global Descriptor Table and Task State Segment (C5).
//!
//! Layout is the hardware-mandated one, not the `x86_64` crate's (that crate
//! targets 4-level long-mode paging; this nucleus is 32-bit protected mode
//! with 2-level paging, so the descriptor shapes differ). Field widths and
//! selector numbers are taken from the original implementation's GDT header.

use core::mem::size_of;

/// One 8-byte GDT entry in the exact bit layout the CPU requires.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        Self {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            granularity: 0,
            base_high: 0,
        }
    }

    /// Builds a flat (base=0, limit=4 GiB) segment descriptor.
    const fn flat(access: u8, granularity: u8) -> Self {
        Self {
            limit_low: 0xffff,
            base_low: 0,
            base_mid: 0,
            access,
            granularity: granularity | 0x0f,
            base_high: 0,
        }
    }

    /// Builds a descriptor pointing at an arbitrary base/limit (used for the
    /// TSS descriptor).
    const fn at(base: u32, limit: u32, access: u8, granularity: u8) -> Self {
        Self {
            limit_low: (limit & 0xffff) as u16,
            base_low: (base & 0xffff) as u16,
            base_mid: ((base >> 16) & 0xff) as u8,
            access,
            granularity: (granularity & 0xf0) | (((limit >> 16) & 0x0f) as u8),
            base_high: ((base >> 24) & 0xff) as u8,
        }
    }
}

/// Selector indices, matching the original implementation's GDT slot order:
/// null, kernel code, kernel data, user code, user data, TSS.
pub const GDT_NULL: usize = 0;
pub const GDT_CODE_DPL0: usize = 1;
pub const GDT_DATA_DPL0: usize = 2;
pub const GDT_CODE_DPL3: usize = 3;
pub const GDT_DATA_DPL3: usize = 4;
pub const GDT_TSS: usize = 5;
pub const GDT_ENTRIES: usize = 6;

const GDTE_SIZE: u16 = size_of::<GdtEntry>() as u16;

/// Kernel code segment selector (ring 0).
pub const KERNEL_CS: u16 = (GDT_CODE_DPL0 as u16) * GDTE_SIZE;
/// Kernel data segment selector (ring 0).
pub const KERNEL_DS: u16 = (GDT_DATA_DPL0 as u16) * GDTE_SIZE;
/// User code segment selector (ring 3, RPL folded in).
pub const USER_CS: u16 = (GDT_CODE_DPL3 as u16) * GDTE_SIZE + 3;
/// User data segment selector (ring 3, RPL folded in).
pub const USER_DS: u16 = (GDT_DATA_DPL3 as u16) * GDTE_SIZE + 3;
/// TSS selector (RPL 3, matching the original's `TSS = 43`).
pub const TSS_SEL: u16 = (GDT_TSS as u16) * GDTE_SIZE + 3;

/// Task State Segment: 104 bytes, field layout fixed by the CPU.
///
/// Only `esp0`/`ss0` (the ring-0 stack used on a privilege-level change) and
/// `iomap` (set past the segment limit so there is effectively no I/O
/// permission bitmap) are meaningfully used by this nucleus; the rest exist
/// because the hardware requires the full 104-byte structure regardless.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Tss {
    link: u32,
    pub esp0: u32,
    pub ss0: u32,
    esp1: u32,
    ss1: u32,
    esp2: u32,
    ss2: u32,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u32,
    cs: u32,
    ss: u32,
    ds: u32,
    fs: u32,
    gs: u32,
    ldtr: u32,
    iomap: u32,
}

pub const TSS_SIZE: usize = size_of::<Tss>();

impl Tss {
    pub const fn new() -> Self {
        Self {
            link: 0,
            esp0: 0,
            ss0: KERNEL_DS as u32,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            ldtr: 0,
            iomap: TSS_SIZE as u32,
        }
    }

    /// Updates the ring-0 stack pointer used on the next user-to-kernel trap.
    /// Called by the scheduler on every context switch so the TSS always
    /// points at the about-to-run thread's kernel stack.
    pub fn set_kernel_stack(&mut self, esp0: u32) {
        self.esp0 = esp0;
    }
}

impl Default for Tss {
    fn default() -> Self {
        Self::new()
    }
}

#[repr(C, packed)]
struct GdtPtr {
    size: u16,
    base: u32,
}

/// Access-byte bit patterns for the segment descriptors this nucleus needs.
mod access {
    pub const PRESENT: u8 = 1 << 7;
    pub const CODE_DATA: u8 = 1 << 4;
    pub const EXEC: u8 = 1 << 3;
    pub const RW: u8 = 1 << 1;
    pub const DPL3: u8 = 3 << 5;
    pub const TSS_TYPE: u8 = 0x9;

    pub const KERNEL_CODE: u8 = PRESENT | CODE_DATA | EXEC | RW;
    pub const KERNEL_DATA: u8 = PRESENT | CODE_DATA | RW;
    pub const USER_CODE: u8 = PRESENT | CODE_DATA | EXEC | RW | DPL3;
    pub const USER_DATA: u8 = PRESENT | CODE_DATA | RW | DPL3;
    pub const TSS_ACCESS: u8 = PRESENT | TSS_TYPE;
}

/// Granularity byte for 4-KiB-granular, 32-bit segments.
const GRAN_4K_32BIT: u8 = 0xc0;

pub struct Gdt {
    entries: [GdtEntry; GDT_ENTRIES],
    tss: Tss,
}

impl Gdt {
    pub const fn new() -> Self {
        Self {
            entries: [
                GdtEntry::null(),
                GdtEntry::flat(access::KERNEL_CODE, GRAN_4K_32BIT),
                GdtEntry::flat(access::KERNEL_DATA, GRAN_4K_32BIT),
                GdtEntry::flat(access::USER_CODE, GRAN_4K_32BIT),
                GdtEntry::flat(access::USER_DATA, GRAN_4K_32BIT),
                GdtEntry::null(), // TSS descriptor installed at init() once its address is known.
            ],
            tss: Tss::new(),
        }
    }

    pub fn tss_mut(&mut self) -> &mut Tss {
        &mut self.tss
    }

    /// Installs the TSS descriptor (its base address is only known once
    /// `self.tss` has a stable address) and flushes both tables to the CPU.
    ///
    /// # Safety
    /// Must run with a valid kernel stack and only once at boot; reloading
    /// segment registers invalidates any assumption the caller had about the
    /// previous GDT contents.
    pub unsafe fn init(&'static mut self) {
        let tss_base = &self.tss as *const Tss as u32;
        self.entries[GDT_TSS] =
            GdtEntry::at(tss_base, (TSS_SIZE - 1) as u32, access::TSS_ACCESS, 0x00);

        let ptr = GdtPtr {
            size: (GDTE_SIZE as usize * GDT_ENTRIES - 1) as u16,
            base: self.entries.as_ptr() as u32,
        };

        // SAFETY: `ptr` describes `self.entries`, which outlives this call
        // because `self` is `'static`; segment selectors reloaded below
        // match the freshly installed table.
        unsafe {
            load_gdt(&ptr);
            load_segments();
            load_tss();
        }
    }
}

impl Default for Gdt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "none")]
unsafe fn load_gdt(ptr: &GdtPtr) {
    use core::arch::asm;
    // SAFETY: `ptr` is a valid `GdtPtr` for the duration of this call.
    unsafe {
        asm!("lgdt [{0}]", in(reg) ptr, options(nostack, preserves_flags));
    }
}

#[cfg(target_os = "none")]
unsafe fn load_segments() {
    use core::arch::asm;
    // SAFETY: `KERNEL_CS`/`KERNEL_DS` name entries just installed by
    // `load_gdt`; the far jump/retf idiom reloads CS without a real call.
    unsafe {
        asm!(
            "push {cs}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            "mov ax, {ds}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            cs = in(reg) KERNEL_CS as u32,
            ds = in(reg) KERNEL_DS as u32,
            tmp = out(reg) _,
            out("ax") _,
            options(nostack)
        );
    }
}

#[cfg(target_os = "none")]
unsafe fn load_tss() {
    use core::arch::asm;
    // SAFETY: `TSS_SEL` names the descriptor just installed in `init`.
    unsafe {
        asm!("ltr {0:x}", in(reg) TSS_SEL, options(nostack, preserves_flags));
    }
}

#[cfg(not(target_os = "none"))]
unsafe fn load_gdt(_ptr: &GdtPtr) {}
#[cfg(not(target_os = "none"))]
unsafe fn load_segments() {}
#[cfg(not(target_os = "none"))]
unsafe fn load_tss() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_match_slot_times_entry_size() {
        assert_eq!(KERNEL_CS, 8);
        assert_eq!(KERNEL_DS, 16);
        assert_eq!(USER_CS, 27);
        assert_eq!(USER_DS, 35);
        assert_eq!(TSS_SEL, 43);
    }

    #[test]
    fn tss_size_is_104_bytes() {
        assert_eq!(TSS_SIZE, 104);
    }

    #[test]
    fn tss_default_ring0_stack_is_zero_until_set() {
        let mut tss = Tss::new();
        assert_eq!({ tss.esp0 }, 0);
        tss.set_kernel_stack(0xdead_0000);
        assert_eq!({ tss.esp0 }, 0xdead_0000);
    }

    #[test]
    fn gdt_entry_size_is_8_bytes() {
        assert_eq!(size_of::<GdtEntry>(), 8);
    }
}
