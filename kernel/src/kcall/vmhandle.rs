//! A small fixed-size table of free-standing address spaces (C4), handed
//! out to user code through the `vmcreate`/`vmmap`/`vmunmap`/`vmctrl`/
//! `vminfo`/`vmremove` kernel calls. Distinct from the per-process `Vmem`
//! every process already owns (C9) — this is the seam user code uses to
//! build an address space it will map into directly, e.g. for a shared
//! memory region, before attaching it to a process.

use crate::error::{KernelError, KernelResult};
use crate::mm::Vmem;
use crate::sync::Spinlock;

const VMEM_HANDLES_MAX: usize = 16;

static HANDLES: Spinlock<[Option<Vmem>; VMEM_HANDLES_MAX]> =
    Spinlock::new([const { None }; VMEM_HANDLES_MAX]);

pub fn create() -> KernelResult<u32> {
    let mut guard = HANDLES.lock();
    let idx = guard.iter().position(|v| v.is_none()).ok_or(KernelError::Again {
        resource: "vmem handle table",
    })?;
    guard[idx] = Some(Vmem::create(None)?);
    Ok(idx as u32)
}

pub fn remove(handle: u32) -> KernelResult<()> {
    let idx = handle as usize;
    let mut guard = HANDLES.lock();
    let slot = guard.get_mut(idx).ok_or(KernelError::Inval {
        reason: "vmem handle out of range",
    })?;
    match slot.take() {
        Some(vmem) => {
            vmem.destroy();
            Ok(())
        }
        None => Err(KernelError::Inval {
            reason: "vmem handle not allocated",
        }),
    }
}

/// Runs `f` against the `Vmem` behind `handle`, holding the table lock for
/// the call's duration.
pub fn with<R>(handle: u32, f: impl FnOnce(&mut Vmem) -> R) -> KernelResult<R> {
    let idx = handle as usize;
    let mut guard = HANDLES.lock();
    let vmem = guard
        .get_mut(idx)
        .and_then(|v| v.as_mut())
        .ok_or(KernelError::Inval {
            reason: "vmem handle not allocated",
        })?;
    Ok(f(vmem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;

    #[test]
    fn create_map_info_unmap_remove_round_trip() {
        // SAFETY: test-only root vmem setup, single-threaded by construction.
        unsafe {
            let _ = crate::mm::vmem::init_root();
        }
        let handle = create().unwrap();
        with(handle, |v| v.map(0x0030_0000, 64, PAGE_SIZE as u32, true, false)).unwrap();
        let info = with(handle, |v| v.info(0x0030_0000)).unwrap().unwrap();
        assert_eq!(info.frame, 64);
        let prior = with(handle, |v| v.unmap(0x0030_0000)).unwrap().unwrap();
        assert_eq!(prior, 64);
        remove(handle).unwrap();
        assert!(with(handle, |v| v.info(0x0030_0000)).is_err());
    }
}
