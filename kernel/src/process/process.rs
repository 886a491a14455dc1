//! Process slot shape and the image-loader seam (C9).

use crate::error::KernelResult;
use crate::mm::vmem::Vmem;
use crate::sched::ThreadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(u32);

impl ProcessId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const KERNEL: ProcessId = ProcessId::new(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Available,
    Active,
}

pub struct ProcessSlot {
    pub pid: ProcessId,
    pub state: ProcessState,
    pub vmem: Option<Vmem>,
    pub root_thread: Option<ThreadId>,
}

impl ProcessSlot {
    pub fn empty(pid: ProcessId) -> Self {
        Self {
            pid,
            state: ProcessState::Available,
            vmem: None,
            root_thread: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == ProcessState::Available
    }
}

/// One already-verified boot module: the raw bytes handed to the image
/// loader, plus the command line the boot front-end (C13) parsed for it.
pub struct BootModule<'a> {
    pub bytes: &'a [u8],
    pub cmdline: &'a str,
}

/// The external ELF-loader collaborator, represented as a trait so the core
/// depends only on "given a verified image, produce a root entry point and
/// lay out loadable segments" rather than on a concrete ELF parser, which is
/// out of scope for this nucleus.
pub trait ImageLoader {
    /// Maps every loadable segment of `image` into `vmem` with its requested
    /// permissions, returning the entry point the root thread should start
    /// executing at.
    fn load(&self, image: &BootModule<'_>, vmem: &mut Vmem) -> KernelResult<u32>;
}

/// Placeholder [`ImageLoader`] linked into the kernel image until a real ELF
/// loader is wired in; every call fails with [`KernelError::Inval`]. Exists so
/// the boot sequence (C13) has something to pass `process_create` without the
/// core depending on a concrete ELF parser, which is out of scope here.
pub struct UnimplementedLoader;

impl ImageLoader for UnimplementedLoader {
    fn load(&self, _image: &BootModule<'_>, _vmem: &mut Vmem) -> KernelResult<u32> {
        Err(crate::error::KernelError::Inval {
            reason: "no ELF loader linked into this kernel image",
        })
    }
}

#[cfg(test)]
pub mod test_loader {
    //! A minimal `ImageLoader` test double: maps one already-built page at a
    //! fixed address and returns a fixed entry point. No real ELF parsing;
    //! exists only to exercise `process_create` end to end.
    use super::*;
    use crate::config::UBASE_VIRT;

    pub struct FixedEntryLoader {
        pub entry: u32,
        pub frame: u32,
    }

    impl ImageLoader for FixedEntryLoader {
        fn load(&self, _image: &BootModule<'_>, vmem: &mut Vmem) -> KernelResult<u32> {
            vmem.map(UBASE_VIRT as u32, self.frame, crate::config::PAGE_SIZE as u32, true, true)?;
            Ok(self.entry)
        }
    }
}
