//! Compile-time kernel tunables.
//!
//! Collected here rather than scattered as literals through the subsystems,
//! following the convention the rest of this pack's kernels use for magic
//! numbers that are really part of the memory/process layout contract.

/// Size of a page, in bytes.
pub const PAGE_SIZE: usize = 4096;
/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;

/// Number of entries in a page table or page directory.
pub const PGDIR_LEN: usize = 1024;
pub const PGTAB_LEN: usize = 1024;

/// Total physical memory the nucleus assumes is present at boot, absent a
/// larger memory map (the boot memory map is authoritative; this is only
/// the size of the low, always-reserved region described below).
pub const MEM_SIZE: usize = 32 * 1024 * 1024;
/// Size of the kernel image's reserved physical range.
pub const KMEM_SIZE: usize = 16 * 1024 * 1024;
/// Size of the kernel page pool's reserved physical range.
pub const KPOOL_SIZE: usize = 4 * 1024 * 1024;

/// Physical base of the kernel image.
pub const KBASE_PHYS: usize = 0x0000_0000;
/// Physical base of the kernel page pool.
pub const KPOOL_PHYS: usize = 0x0100_0000;
/// Physical base at and above which addresses are user-available.
pub const USER_BASE_PHYS: usize = 0x0200_0000;

/// Virtual base of user space.
pub const UBASE_VIRT: usize = 0x0200_0000;
/// Virtual address of the top of the user stack.
pub const USTACK_ADDR: usize = 0xc000_0000;
/// Virtual base of the kernel image (high half).
pub const KBASE_VIRT: usize = 0xc000_0000;
/// Virtual base of the kernel page pool (high half).
pub const KPOOL_VIRT: usize = 0xc100_0000;

/// Number of kernel pages in the kernel page pool.
pub const NUM_KPAGES: usize = KPOOL_SIZE / PAGE_SIZE;

/// Maximum number of live processes.
pub const PROCESS_MAX: usize = 32;
/// Maximum number of live threads (includes the idle and service threads).
pub const THREADS_MAX: usize = 64;

/// Slot reserved for the idle thread.
pub const IDLE_THREAD_ID: usize = 0;
/// Slot reserved for the kernel-call service thread.
pub const SERVICE_THREAD_ID: usize = 1;

/// Default round-robin quantum, in scheduler ticks.
pub const DEFAULT_QUANTUM: u32 = 10;

/// Maximum number of memory-map entries accepted from the boot loader.
pub const MAX_MEM_REGIONS: usize = 16;
/// Maximum number of boot modules accepted from the boot loader.
pub const MAX_MODULES: usize = 8;
/// Maximum length of a module command line.
pub const MODULE_CMDLINE_LEN: usize = 64;

/// Size of the kernel log ring buffer, in bytes.
pub const KLOG_SIZE: usize = 4096;
/// Size of the scratch buffer used to flush/format log chunks.
pub const KBUFFER_SIZE: usize = 256;

/// Number of IRQ levels the LPIC supports (resolved from the 8259 driver:
/// six hierarchical levels, 0 = all unmasked through 5 = all masked).
pub const NUM_INTLVL: usize = 6;

/// Number of CPU exception vectors (0-31 on x86).
pub const EXCEPTIONS_NUM: usize = 32;
/// Number of IRQ lines behind the LPIC (the 8259 pair handles 16).
pub const IRQS_NUM: usize = 16;

/// Software trap vector used for kernel calls.
pub const KCALL_TRAP_VECTOR: u8 = 0x80;

/// Threshold of consecutive unhandled IRQs before the interrupt dispatcher
/// switches into verbose logging.
pub const INTERRUPT_SPURIOUS_THRESHOLD: u32 = 100;
