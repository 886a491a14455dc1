//! Kernel page pool (C3): identical in shape to the frame allocator, but
//! every entry is pre-mapped into the kernel's page directory, so allocation
//! hands back a directly dereferenceable pointer instead of a bare frame
//! number. Page tables and page directories (C4) are themselves allocated
//! from this pool.

use crate::config::{KPOOL_PHYS, KPOOL_VIRT, NUM_KPAGES, PAGE_SIZE};
use crate::error::{KernelError, KernelResult};
use crate::sync::Spinlock;

/// Backing storage for the pool. On real hardware this range is simply
/// physical memory, pre-mapped 1:1 at boot; the static array stands in for
/// that memory here so the same allocator logic is exercisable on the host
/// test build.
static mut BACKING: [[u8; PAGE_SIZE]; NUM_KPAGES] = [[0; PAGE_SIZE]; NUM_KPAGES];

struct State {
    refcounts: [u8; NUM_KPAGES],
}

pub struct KernelPagePool {
    state: Spinlock<State>,
}

impl KernelPagePool {
    pub const fn new() -> Self {
        Self {
            state: Spinlock::new(State {
                refcounts: [0; NUM_KPAGES],
            }),
        }
    }

    /// Allocates one kernel page, optionally zeroing it first.
    #[allow(static_mut_refs)]
    pub fn get(&self, clean: bool) -> KernelResult<*mut u8> {
        let mut guard = self.state.lock();
        let idx = guard
            .refcounts
            .iter()
            .position(|&rc| rc == 0)
            .ok_or(KernelError::Nomem {
                resource: "kernel page pool",
            })?;
        guard.refcounts[idx] = 1;
        drop(guard);
        // SAFETY: `idx` was just claimed exclusively by incrementing its
        // refcount above; no other caller can observe the same slot as free
        // until it is released through `put`.
        let ptr = unsafe { BACKING[idx].as_mut_ptr() };
        if clean {
            // SAFETY: `ptr` points to a whole, exclusively-owned page.
            unsafe { core::ptr::write_bytes(ptr, 0, PAGE_SIZE) };
        }
        Ok(ptr)
    }

    /// Returns a page allocated with `get`. `ptr` must be exactly a pool
    /// slot's base address.
    pub fn put(&self, ptr: *mut u8) -> KernelResult<()> {
        let idx = self.index_of(ptr)?;
        let mut guard = self.state.lock();
        if guard.refcounts[idx] == 0 {
            return Err(KernelError::Inval {
                reason: "double free of kernel page",
            });
        }
        guard.refcounts[idx] -= 1;
        Ok(())
    }

    #[allow(static_mut_refs)]
    fn index_of(&self, ptr: *mut u8) -> KernelResult<usize> {
        // SAFETY: reading the base address of a `static`, not dereferencing it.
        let base = unsafe { BACKING.as_ptr() as usize };
        let addr = ptr as usize;
        let offset = addr
            .checked_sub(base)
            .filter(|off| off % PAGE_SIZE == 0)
            .ok_or(KernelError::Inval {
                reason: "pointer is not kpool-range-aligned",
            })?;
        let idx = offset / PAGE_SIZE;
        if idx >= NUM_KPAGES {
            return Err(KernelError::Inval {
                reason: "pointer outside kernel page pool",
            });
        }
        Ok(idx)
    }

    /// Translates a physical frame number within the kernel page pool's
    /// range to the permanently-mapped kernel pointer backing it.
    #[allow(static_mut_refs)]
    pub fn frame_to_ptr(&self, frame: u32) -> KernelResult<*mut u8> {
        let phys = frame as usize * PAGE_SIZE;
        let offset = phys
            .checked_sub(KPOOL_PHYS)
            .filter(|off| *off < NUM_KPAGES * PAGE_SIZE)
            .ok_or(KernelError::Inval {
                reason: "frame outside kernel page pool",
            })?;
        // SAFETY: `offset` is within bounds of `BACKING`, checked above.
        Ok(unsafe { BACKING.as_mut_ptr().cast::<u8>().add(offset) })
    }

    pub fn ptr_to_frame(&self, ptr: *mut u8) -> u32 {
        let idx = self.index_of(ptr).expect("ptr_to_frame on a non-pool pointer");
        (KPOOL_PHYS / PAGE_SIZE + idx) as u32
    }
}

impl Default for KernelPagePool {
    fn default() -> Self {
        Self::new()
    }
}

/// Virtual address a kernel pool pointer would carry once paging is on,
/// offered for code that needs the high-half address rather than the raw
/// backing pointer (identical numerically in the host test build, where
/// paging is never actually enabled).
pub const fn kptr_to_virt(phys_offset: usize) -> usize {
    KPOOL_VIRT + phys_offset
}

pub static KPOOL: KernelPagePool = KernelPagePool::new();

#[cfg(test)]
mod tests {
    use super::*;

    // `BACKING` is one physical resource shared by every `KernelPagePool`
    // instance, mirroring real hardware; serialize tests through it rather
    // than giving each test its own (impossible) backing store.
    static TEST_LOCK: Spinlock<()> = Spinlock::new(());

    #[test]
    fn get_then_put_round_trips() {
        let _serial = TEST_LOCK.lock();
        let pool = KernelPagePool::new();
        let ptr = pool.get(true).unwrap();
        pool.put(ptr).unwrap();
    }

    #[test]
    fn double_put_is_an_error() {
        let _serial = TEST_LOCK.lock();
        let pool = KernelPagePool::new();
        let ptr = pool.get(false).unwrap();
        pool.put(ptr).unwrap();
        assert!(pool.put(ptr).is_err());
    }

    #[test]
    fn clean_pages_are_zeroed() {
        let _serial = TEST_LOCK.lock();
        let pool = KernelPagePool::new();
        let ptr = pool.get(false).unwrap();
        // SAFETY: exclusively owned by this test for its duration.
        unsafe { *ptr = 0xff };
        pool.put(ptr).unwrap();
        let ptr2 = pool.get(true).unwrap();
        // SAFETY: exclusively owned by this test for its duration.
        assert_eq!(unsafe { *ptr2 }, 0);
        pool.put(ptr2).unwrap();
    }
}
