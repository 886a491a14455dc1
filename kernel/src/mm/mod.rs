//! Virtual-memory manager (C2, C3, C4): the boot-time memory layout, page
//! frame allocator, kernel page pool, and per-process address spaces.

pub mod frame_allocator;
pub mod kpool;
pub mod page_table;
pub mod vmem;

pub use frame_allocator::{FrameAllocator, MemRegion, RegionKind, FRAMES};
pub use kpool::{KernelPagePool, KPOOL};
pub use vmem::{MappingInfo, Vmem};

/// # Safety
/// Must run once at boot, after the memory map is known and before any
/// process is created.
pub unsafe fn init(regions: &[frame_allocator::MemRegion]) -> crate::error::KernelResult<()> {
    FRAMES.init(regions);
    // SAFETY: delegated to this function's safety doc.
    unsafe { vmem::init_root() }
}
