//! User-memory frame allocator (C2): a linear-scan, reference-counted
//! allocator over the boot-provided memory map.
//!
//! Scanning is linear by design: correctness over throughput. The pool is a
//! few thousand frames at most and the kernel only allocates outside process
//! creation rarely, so a buddy or free-list allocator would add bookkeeping
//! the workload doesn't need.

use crate::config::{PAGE_SIZE, USER_BASE_PHYS};
use crate::error::{KernelError, KernelResult};
use crate::sync::Spinlock;

/// One entry per frame of reclaimable memory: `{ base, size, kind }`, as
/// handed over by the boot loader. `kind` partitions memory the allocator
/// must never touch (reserved firmware/ACPI ranges, known-bad RAM) from
/// memory it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Available,
    Reserved,
    Bad,
}

#[derive(Debug, Clone, Copy)]
pub struct MemRegion {
    pub base: u32,
    pub size: u32,
    pub kind: RegionKind,
}

struct State {
    refcounts: [u8; NUM_UFRAMES],
    base_frame: u32,
}

/// Number of frames in the user-available range. Sized generously; the
/// actual usable count after subtracting reserved ranges is always ≤ this.
const NUM_UFRAMES: usize = 8192;

pub struct FrameAllocator {
    state: Spinlock<Option<State>>,
}

impl FrameAllocator {
    pub const fn new() -> Self {
        Self {
            state: Spinlock::new(None),
        }
    }

    /// Registers the available ranges from the boot memory map, after the
    /// caller has already subtracted the kernel image, kernel page pool, and
    /// module ranges. `base_frame` is the frame number of `USER_BASE_PHYS`.
    pub fn init(&self, regions: &[MemRegion]) {
        let base_frame = USER_BASE_PHYS as u32 / PAGE_SIZE as u32;
        let mut refcounts = [1u8; NUM_UFRAMES];
        for region in regions {
            if region.kind != RegionKind::Available {
                continue;
            }
            let start = (region.base / PAGE_SIZE as u32).saturating_sub(base_frame);
            let count = region.size / PAGE_SIZE as u32;
            for i in 0..count {
                let idx = (start + i) as usize;
                if idx < NUM_UFRAMES {
                    refcounts[idx] = 0;
                }
            }
        }
        *self.state.lock() = Some(State {
            refcounts,
            base_frame,
        });
    }

    pub fn alloc(&self) -> KernelResult<u32> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().expect("frame allocator not initialized");
        for (i, rc) in state.refcounts.iter_mut().enumerate() {
            if *rc == 0 {
                *rc = 1;
                return Ok(state.base_frame + i as u32);
            }
        }
        Err(KernelError::Nomem {
            resource: "user frame pool",
        })
    }

    pub fn free(&self, frame: u32) -> KernelResult<()> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().expect("frame allocator not initialized");
        let idx = frame
            .checked_sub(state.base_frame)
            .filter(|&i| (i as usize) < NUM_UFRAMES)
            .ok_or(KernelError::Inval {
                reason: "frame outside user pool",
            })? as usize;
        if state.refcounts[idx] == 0 {
            return Err(KernelError::Inval {
                reason: "double free of user frame",
            });
        }
        state.refcounts[idx] -= 1;
        Ok(())
    }

    pub fn is_allocated(&self, frame: u32) -> bool {
        let guard = self.state.lock();
        let Some(state) = guard.as_ref() else {
            return false;
        };
        frame
            .checked_sub(state.base_frame)
            .and_then(|i| state.refcounts.get(i as usize))
            .is_some_and(|&rc| rc > 0)
    }
}

impl Default for FrameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

pub static FRAMES: FrameAllocator = FrameAllocator::new();

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> FrameAllocator {
        let alloc = FrameAllocator::new();
        alloc.init(&[MemRegion {
            base: USER_BASE_PHYS as u32,
            size: 4 * PAGE_SIZE as u32,
            kind: RegionKind::Available,
        }]);
        alloc
    }

    #[test]
    fn alloc_then_free_round_trips() {
        let alloc = fresh();
        let f = alloc.alloc().unwrap();
        assert!(alloc.is_allocated(f));
        alloc.free(f).unwrap();
        assert!(!alloc.is_allocated(f));
    }

    #[test]
    fn exhaustion_is_reported() {
        let alloc = fresh();
        for _ in 0..4 {
            alloc.alloc().unwrap();
        }
        assert!(alloc.alloc().is_err());
    }

    #[test]
    fn double_free_is_an_error() {
        let alloc = fresh();
        let f = alloc.alloc().unwrap();
        alloc.free(f).unwrap();
        assert!(alloc.free(f).is_err());
    }
}
