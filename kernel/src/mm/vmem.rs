//! Virtual memory (C4): per-process page directories built by cloning the
//! kernel half of a canonical root vmem, so kernel code and data are mapped
//! identically in every address space — required for traps to be
//! serviceable before a process's user half is populated.

use crate::arch::x86::mmu::{split_vaddr, Pde, Pte, PGDIR_LENGTH};
use crate::config::{KBASE_VIRT, PAGE_SIZE};
use crate::error::{KernelError, KernelResult};
use crate::mm::kpool::KPOOL;
use crate::mm::page_table::{self, PageDirectory, PageTable};
use crate::sync::Spinlock;

#[derive(Debug, Clone, Copy)]
pub struct MappingInfo {
    pub frame: u32,
    pub writable: bool,
    pub user: bool,
}

pub struct Vmem {
    pgdir: *mut PageDirectory,
    pgdir_frame: u32,
}

// SAFETY: every `Vmem` is owned by exactly one process slot, itself behind
// the process table's lock; no two threads observe the same `Vmem`
// concurrently without already holding that lock.
unsafe impl Send for Vmem {}

impl Vmem {
    /// Builds a new address space. If `src` is given, its kernel half is
    /// copied verbatim; otherwise the canonical root vmem's kernel half is
    /// used. The user half always starts empty.
    pub fn create(src: Option<&Vmem>) -> KernelResult<Self> {
        let (pgdir, pgdir_frame) = page_table::alloc_page_directory()?;
        let source = src.map(|v| v.pgdir).unwrap_or_else(root_pgdir_ptr);

        let kernel_start = KBASE_VIRT >> 22;
        // SAFETY: both pointers name valid, kpool-backed page directories;
        // `source` outlives this call (the root vmem is never freed, and a
        // caller-provided `src` outlives its own `Vmem`).
        unsafe {
            for i in kernel_start..PGDIR_LENGTH {
                (*pgdir).entries[i] = (*source).entries[i];
            }
            for i in 0..kernel_start {
                (*pgdir).entries[i] = Pde::zeroed();
            }
        }

        Ok(Self { pgdir, pgdir_frame })
    }

    /// Frees every user-half page table back to the kernel pool. User frames
    /// themselves are not freed: they are owned by the caller (the process
    /// manager reclaims them separately via the frame allocator).
    pub fn destroy(self) {
        let kernel_start = KBASE_VIRT >> 22;
        // SAFETY: `self.pgdir` is a live, exclusively-owned page directory.
        unsafe {
            for i in 0..kernel_start {
                let pde = (*self.pgdir).entries[i];
                if pde.present() {
                    if let Ok(pt_ptr) = page_table::page_table_at(pde.frame()) {
                        let _ = KPOOL.put(pt_ptr.cast::<u8>());
                    }
                }
            }
        }
        let _ = KPOOL.put((self.pgdir as *mut u8).cast());
    }

    pub fn pgdir_frame(&self) -> u32 {
        self.pgdir_frame
    }

    fn ensure_page_table(&mut self, pd_index: usize) -> KernelResult<*mut PageTable> {
        // SAFETY: `self.pgdir` is a live, exclusively-owned page directory.
        unsafe {
            let pde = (*self.pgdir).entries[pd_index];
            if pde.present() {
                return page_table::page_table_at(pde.frame());
            }
            let (pt_ptr, pt_frame) = page_table::alloc_page_table()?;
            (*self.pgdir).entries[pd_index] = Pde::mapping(pt_frame, true, true);
            Ok(pt_ptr)
        }
    }

    /// Maps `size` bytes starting at the page-aligned `vaddr` to consecutive
    /// physical frames starting at `frame`, installing page tables as
    /// needed. On an out-of-memory failure midway through, whatever has
    /// already been installed is left in place; callers are expected to
    /// tear down the vmem rather than attempt a partial rollback.
    pub fn map(&mut self, vaddr: u32, frame: u32, size: u32, writable: bool, user: bool) -> KernelResult<()> {
        if vaddr % PAGE_SIZE as u32 != 0 {
            return Err(KernelError::Inval {
                reason: "vmem_map requires a page-aligned vaddr",
            });
        }
        if size % PAGE_SIZE as u32 != 0 {
            return Err(KernelError::Inval {
                reason: "vmem_map requires a page-multiple size",
            });
        }
        let pages = size / PAGE_SIZE as u32;
        for i in 0..pages {
            let page_vaddr = vaddr + i * PAGE_SIZE as u32;
            let page_frame = frame + i;
            let (pd_index, pt_index, _) = split_vaddr(page_vaddr);
            let pt_ptr = self.ensure_page_table(pd_index)?;
            // SAFETY: `pt_ptr` was just returned as a live page table.
            unsafe {
                (*pt_ptr).entries[pt_index] = Pte::mapping(page_frame, writable, user);
            }
        }
        crate::arch::x86::io::tlb_flush();
        Ok(())
    }

    /// Removes exactly one page's mapping, returning its prior frame number.
    pub fn unmap(&mut self, vaddr: u32) -> KernelResult<u32> {
        let (pd_index, pt_index, _) = split_vaddr(vaddr);
        // SAFETY: `self.pgdir` is a live, exclusively-owned page directory.
        let pde = unsafe { (*self.pgdir).entries[pd_index] };
        if !pde.present() {
            return Err(KernelError::Inval {
                reason: "vmem_unmap on an unmapped page table",
            });
        }
        let pt_ptr = page_table::page_table_at(pde.frame())?;
        // SAFETY: `pt_ptr` names a live page table.
        unsafe {
            let pte = (*pt_ptr).entries[pt_index];
            if !pte.present() {
                return Err(KernelError::Inval {
                    reason: "vmem_unmap on an unmapped page",
                });
            }
            (*pt_ptr).entries[pt_index] = Pte::zeroed();
            crate::arch::x86::io::tlb_flush();
            Ok(pte.frame())
        }
    }

    /// Changes the writable/user bits on one present PTE.
    pub fn ctrl(&mut self, vaddr: u32, writable: bool, user: bool) -> KernelResult<()> {
        let (pd_index, pt_index, _) = split_vaddr(vaddr);
        // SAFETY: `self.pgdir` is a live, exclusively-owned page directory.
        let pde = unsafe { (*self.pgdir).entries[pd_index] };
        if !pde.present() {
            return Err(KernelError::Inval {
                reason: "vmem_ctrl on an unmapped page table",
            });
        }
        let pt_ptr = page_table::page_table_at(pde.frame())?;
        // SAFETY: `pt_ptr` names a live page table.
        unsafe {
            let pte = (*pt_ptr).entries[pt_index];
            if !pte.present() {
                return Err(KernelError::Inval {
                    reason: "vmem_ctrl on an unmapped page",
                });
            }
            (*pt_ptr).entries[pt_index] = Pte::mapping(pte.frame(), writable, user);
        }
        crate::arch::x86::io::tlb_flush();
        Ok(())
    }

    pub fn info(&self, vaddr: u32) -> KernelResult<MappingInfo> {
        let (pd_index, pt_index, _) = split_vaddr(vaddr);
        // SAFETY: `self.pgdir` is a live, exclusively-owned page directory.
        let pde = unsafe { (*self.pgdir).entries[pd_index] };
        if !pde.present() {
            return Err(KernelError::Inval {
                reason: "vmem_info on an unmapped page table",
            });
        }
        let pt_ptr = page_table::page_table_at(pde.frame())?;
        // SAFETY: `pt_ptr` names a live page table.
        let pte = unsafe { (*pt_ptr).entries[pt_index] };
        if !pte.present() {
            return Err(KernelError::Inval {
                reason: "vmem_info on an unmapped page",
            });
        }
        Ok(MappingInfo {
            frame: pte.frame(),
            writable: pte.writable(),
            user: pte.user(),
        })
    }
}

struct RootPgdir(*mut PageDirectory, u32);

// SAFETY: the pointer is written once by `init_root` at boot and never
// mutated afterwards; every later reader only dereferences it under the
// same single-CPU cooperative scheduling discipline as every other vmem.
unsafe impl Send for RootPgdir {}

static ROOT: Spinlock<Option<RootPgdir>> = Spinlock::new(None);

fn root_pgdir_ptr() -> *mut PageDirectory {
    ROOT.lock().as_ref().expect("root vmem not initialized").0
}

/// Builds the canonical root vmem: identity-maps the kernel image and
/// kernel page pool with `user=false, writable=true`, leaving the user half
/// empty. Every later `Vmem::create(None)` clones this directory's kernel
/// half.
///
/// # Safety
/// Must run once, before any process or thread is created.
pub unsafe fn init_root() -> KernelResult<()> {
    let (pgdir, pgdir_frame) = page_table::alloc_page_directory()?;
    let kernel_start = KBASE_VIRT >> 22;
    // Only the kernel image and kernel page pool (`KMEM_SIZE + KPOOL_SIZE`)
    // need an identity mapping; the rest of the high half stays unmapped
    // until something needs it.
    let kernel_pd_entries =
        (crate::config::KMEM_SIZE + crate::config::KPOOL_SIZE).div_ceil(1 << 22);

    // SAFETY: `pgdir` was just allocated and is exclusively owned here.
    unsafe {
        for offset in 0..kernel_pd_entries {
            let pd_index = kernel_start + offset;
            let (pt_ptr, pt_frame) = page_table::alloc_page_table()?;
            (*pgdir).entries[pd_index] = Pde::mapping(pt_frame, true, false);
            let phys_base = (offset as u32) << 22;
            for pt_index in 0..crate::arch::x86::mmu::PGTAB_LENGTH {
                let frame = (phys_base >> 12) + pt_index as u32;
                (*pt_ptr).entries[pt_index] = Pte::mapping(frame, true, false);
            }
        }
    }

    *ROOT.lock() = Some(RootPgdir(pgdir, pgdir_frame));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_root<R>(f: impl FnOnce() -> R) -> R {
        // SAFETY: test-only, single-threaded-by-construction setup.
        unsafe {
            let _ = init_root();
        }
        f()
    }

    #[test]
    fn created_vmem_clones_kernel_half() {
        with_root(|| {
            let vmem = Vmem::create(None).unwrap();
            let kernel_start = (KBASE_VIRT >> 22) as usize;
            // SAFETY: both directories are live kpool pages.
            unsafe {
                assert_eq!(
                    (*vmem.pgdir).entries[kernel_start].raw(),
                    (*root_pgdir_ptr()).entries[kernel_start].raw()
                );
                assert!(!(*vmem.pgdir).entries[0].present());
            }
        });
    }

    #[test]
    fn map_then_info_reports_the_mapping() {
        with_root(|| {
            let mut vmem = Vmem::create(None).unwrap();
            vmem.map(0x0020_0000, 0x10, PAGE_SIZE as u32, true, true).unwrap();
            let info = vmem.info(0x0020_0000).unwrap();
            assert_eq!(info.frame, 0x10);
            assert!(info.writable);
            assert!(info.user);
        });
    }

    #[test]
    fn unmap_clears_the_pte_and_returns_prior_frame() {
        with_root(|| {
            let mut vmem = Vmem::create(None).unwrap();
            vmem.map(0x0020_0000, 0x11, PAGE_SIZE as u32, true, true).unwrap();
            let prior = vmem.unmap(0x0020_0000).unwrap();
            assert_eq!(prior, 0x11);
            assert!(vmem.info(0x0020_0000).is_err());
        });
    }
}
