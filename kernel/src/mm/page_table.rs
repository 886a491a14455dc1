//! Raw page table/directory storage (C4): a page directory is 1024 PDEs,
//! each optionally pointing at a page table of 1024 PTEs. Both live in
//! kernel-pool pages so their physical address can be loaded into CR3 or
//! referenced by a parent PDE.

use crate::arch::x86::mmu::{Pde, Pte, PGDIR_LENGTH, PGTAB_LENGTH};
use crate::error::KernelResult;
use crate::mm::kpool::KPOOL;

#[repr(C)]
pub struct PageTable {
    pub entries: [Pte; PGTAB_LENGTH],
}

#[repr(C)]
pub struct PageDirectory {
    pub entries: [Pde; PGDIR_LENGTH],
}

const _: () = assert!(core::mem::size_of::<PageTable>() == crate::config::PAGE_SIZE);
const _: () = assert!(core::mem::size_of::<PageDirectory>() == crate::config::PAGE_SIZE);

/// Allocates and zeroes one page-table-sized kernel page.
pub fn alloc_page_table() -> KernelResult<(*mut PageTable, u32)> {
    let ptr = KPOOL.get(true)?;
    let frame = KPOOL.ptr_to_frame(ptr);
    Ok((ptr.cast::<PageTable>(), frame))
}

pub fn alloc_page_directory() -> KernelResult<(*mut PageDirectory, u32)> {
    let ptr = KPOOL.get(true)?;
    let frame = KPOOL.ptr_to_frame(ptr);
    Ok((ptr.cast::<PageDirectory>(), frame))
}

pub fn page_table_at(frame: u32) -> KernelResult<*mut PageTable> {
    Ok(KPOOL.frame_to_ptr(frame)?.cast::<PageTable>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_table_is_exactly_one_page() {
        assert_eq!(core::mem::size_of::<PageTable>(), crate::config::PAGE_SIZE);
        assert_eq!(
            core::mem::size_of::<PageDirectory>(),
            crate::config::PAGE_SIZE
        );
    }
}
