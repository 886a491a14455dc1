//! Boot configuration (C16): the typed front-end every multiboot-version-
//! specific parser feeds.
//!
//! `BootInfo` is never populated by direct field access — only through the
//! registration calls below — so swapping the boot protocol (multiboot1,
//! multiboot2, a hand-rolled loader) never touches anything past this file.

use crate::config::{MAX_MEM_REGIONS, MAX_MODULES, MODULE_CMDLINE_LEN};
use crate::mm::MemRegion;
use crate::sync::Spinlock;

/// One boot-loaded module: a physical range plus the command line the boot
/// protocol associated with it. Distinct from [`crate::process::BootModule`],
/// which wraps the verified, already-mapped bytes an `ImageLoader` consumes;
/// this is the raw physical-address form the boot front-end first sees.
#[derive(Debug, Clone, Copy)]
pub struct BootModule {
    pub base: u32,
    pub size: u32,
    cmdline: [u8; MODULE_CMDLINE_LEN],
    cmdline_len: usize,
}

impl BootModule {
    pub fn cmdline(&self) -> &str {
        core::str::from_utf8(&self.cmdline[..self.cmdline_len]).unwrap_or("")
    }
}

/// Whether an ACPI RSDP was found, and where. Only a hint: nothing in this
/// nucleus parses ACPI tables (see the Non-goals in C16).
#[derive(Debug, Clone, Copy, Default)]
pub struct AcpiHint {
    pub rsdp: Option<u32>,
}

pub struct BootInfo {
    memory_map: [MemRegion; MAX_MEM_REGIONS],
    memory_map_len: usize,
    modules: [BootModule; MAX_MODULES],
    modules_len: usize,
    pub acpi: AcpiHint,
}

const EMPTY_REGION: MemRegion = MemRegion {
    base: 0,
    size: 0,
    kind: crate::mm::RegionKind::Reserved,
};
const EMPTY_MODULE: BootModule = BootModule {
    base: 0,
    size: 0,
    cmdline: [0; MODULE_CMDLINE_LEN],
    cmdline_len: 0,
};

impl BootInfo {
    pub const fn empty() -> Self {
        Self {
            memory_map: [EMPTY_REGION; MAX_MEM_REGIONS],
            memory_map_len: 0,
            modules: [EMPTY_MODULE; MAX_MODULES],
            modules_len: 0,
            acpi: AcpiHint { rsdp: None },
        }
    }

    pub fn memory_map(&self) -> &[MemRegion] {
        &self.memory_map[..self.memory_map_len]
    }

    pub fn modules(&self) -> &[BootModule] {
        &self.modules[..self.modules_len]
    }

    fn push_region(&mut self, region: MemRegion) -> bool {
        if self.memory_map_len == MAX_MEM_REGIONS {
            return false;
        }
        self.memory_map[self.memory_map_len] = region;
        self.memory_map_len += 1;
        true
    }

    /// Registers an `available` memory-map entry. Returns `false`, dropping
    /// the entry, if the map is already at `MAX_MEM_REGIONS` — a boot
    /// protocol handing over more ranges than that is a configuration error
    /// the platform front-end should log, not something this module can
    /// recover from.
    pub fn mmap_register_available(&mut self, base: u32, size: u32) -> bool {
        self.push_region(MemRegion {
            base,
            size,
            kind: crate::mm::RegionKind::Available,
        })
    }

    pub fn mmap_register_reserved(&mut self, base: u32, size: u32) -> bool {
        self.push_region(MemRegion {
            base,
            size,
            kind: crate::mm::RegionKind::Reserved,
        })
    }

    pub fn mmap_register_erroneous(&mut self, base: u32, size: u32) -> bool {
        self.push_region(MemRegion {
            base,
            size,
            kind: crate::mm::RegionKind::Bad,
        })
    }

    /// Registers a boot module. `cmdline` is truncated to
    /// `MODULE_CMDLINE_LEN` bytes if the boot protocol handed over more.
    pub fn kmod_register(&mut self, base: u32, size: u32, cmdline: &str) -> bool {
        if self.modules_len == MAX_MODULES {
            return false;
        }
        let bytes = cmdline.as_bytes();
        let len = bytes.len().min(MODULE_CMDLINE_LEN);
        let mut buf = [0u8; MODULE_CMDLINE_LEN];
        buf[..len].copy_from_slice(&bytes[..len]);
        self.modules[self.modules_len] = BootModule {
            base,
            size,
            cmdline: buf,
            cmdline_len: len,
        };
        self.modules_len += 1;
        true
    }

    pub fn acpi_register(&mut self, rsdp: u32) {
        self.acpi.rsdp = Some(rsdp);
    }
}

impl Default for BootInfo {
    fn default() -> Self {
        Self::empty()
    }
}

struct ModuleRegistry {
    modules: [BootModule; MAX_MODULES],
    len: usize,
}

static MODULES: Spinlock<ModuleRegistry> = Spinlock::new(ModuleRegistry {
    modules: [EMPTY_MODULE; MAX_MODULES],
    len: 0,
});

/// Snapshots `info`'s module list into process-wide storage (C13) so the
/// `kmod_get` kernel call (C10) can look modules up by index after boot,
/// without keeping the whole `BootInfo` borrow alive past the boot sequence.
pub fn install_modules(modules: &[BootModule]) {
    let mut guard = MODULES.lock();
    let n = modules.len().min(MAX_MODULES);
    guard.modules[..n].copy_from_slice(&modules[..n]);
    guard.len = n;
}

/// The boot module at `index`, if one was registered there.
pub fn module_at(index: usize) -> Option<BootModule> {
    let guard = MODULES.lock();
    if index < guard.len {
        Some(guard.modules[index])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_regions_modules_and_acpi_hint() {
        let mut info = BootInfo::empty();
        assert!(info.mmap_register_available(0, 64 * 1024 * 1024));
        assert!(info.mmap_register_reserved(0x000a_0000, 0x0002_0000));
        assert!(info.kmod_register(0x0040_0000, 4096, "init"));
        info.acpi_register(0x000f_0000);

        assert_eq!(info.memory_map().len(), 2);
        assert_eq!(info.modules().len(), 1);
        assert_eq!(info.modules()[0].cmdline(), "init");
        assert_eq!(info.acpi.rsdp, Some(0x000f_0000));
    }

    #[test]
    fn registration_past_capacity_is_rejected() {
        let mut info = BootInfo::empty();
        for i in 0..MAX_MEM_REGIONS {
            assert!(info.mmap_register_available(i as u32 * 4096, 4096));
        }
        assert!(!info.mmap_register_available(0, 4096));
    }

    #[test]
    fn long_cmdline_is_truncated_not_rejected() {
        let mut info = BootInfo::empty();
        let long = "x".repeat(MODULE_CMDLINE_LEN + 16);
        assert!(info.kmod_register(0, 4096, &long));
        assert_eq!(info.modules()[0].cmdline().len(), MODULE_CMDLINE_LEN);
    }

    #[test]
    fn installed_modules_are_looked_up_by_index() {
        let mut info = BootInfo::empty();
        info.kmod_register(0x0040_0000, 4096, "init");
        install_modules(info.modules());
        let module = module_at(0).expect("module 0 should be installed");
        assert_eq!(module.base, 0x0040_0000);
        assert_eq!(module.size, 4096);
        assert!(module_at(1).is_none());
    }
}
