//! Multiboot1 boot-information front-end (C16): the one concrete parser this
//! image ships, built entirely on `kargs::BootInfo`'s registration calls so a
//! different boot protocol could replace this file without touching anything
//! past it.
//!
//! Field offsets are taken from the Multiboot Specification 0.6.96, `flags`
//! bit 0 (`mem_*`), bit 3 (`mods_*`) and bit 6 (`mmap_*`) only — this nucleus
//! does not read the AOUT/ELF symbol table tags or the rest of the structure.

use crate::kargs::BootInfo;

pub const MAGIC: u32 = 0x2BAD_B002;

#[repr(C)]
struct MultibootInfo {
    flags: u32,
    mem_lower: u32,
    mem_upper: u32,
    boot_device: u32,
    cmdline: u32,
    mods_count: u32,
    mods_addr: u32,
    _syms: [u32; 4],
    mmap_length: u32,
    mmap_addr: u32,
}

#[repr(C)]
struct MultibootMmapEntry {
    size: u32,
    base_addr: u64,
    length: u64,
    kind: u32,
}

#[repr(C)]
struct MultibootModule {
    mod_start: u32,
    mod_end: u32,
    cmdline: u32,
    _reserved: u32,
}

/// `kind` as Multiboot defines it: 1 is available RAM, everything else is
/// reserved or unusable from this nucleus's point of view.
const MULTIBOOT_MEMORY_AVAILABLE: u32 = 1;

/// Reads a NUL-terminated string at a physical address already known to be
/// mapped (identity-mapped low memory, true for everything multiboot hands
/// back before paging is reconfigured).
///
/// # Safety
/// `addr` must point to a NUL-terminated, readable string, or be 0.
unsafe fn read_cstr(addr: u32, max: usize) -> &'static str {
    if addr == 0 {
        return "";
    }
    // SAFETY: delegated to this function's safety doc.
    let bytes = unsafe { core::slice::from_raw_parts(addr as *const u8, max) };
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(max);
    core::str::from_utf8(&bytes[..len]).unwrap_or("")
}

/// Builds a [`BootInfo`] from the raw structure GRUB (or any multiboot1
/// loader) leaves at `info_addr`, checking `magic` first.
///
/// # Safety
/// `magic`/`info_addr` must be exactly the `eax`/`ebx` values the loader
/// handed to `_start`, with `info_addr` still pointing at live, readable
/// memory (true at the point `_start` calls into Rust, before paging is
/// reconfigured).
pub unsafe fn parse(magic: u32, info_addr: u32) -> BootInfo {
    let mut info = BootInfo::empty();
    if magic != MAGIC || info_addr == 0 {
        log::warn!("multiboot magic mismatch (0x{magic:08x}); booting with an empty memory map");
        return info;
    }

    // SAFETY: delegated to this function's safety doc.
    let mb = unsafe { &*(info_addr as *const MultibootInfo) };

    if mb.flags & 0b1 != 0 && mb.mmap_length == 0 {
        // `mem_lower`/`mem_upper` only, no detailed map: treat all of
        // reported upper memory (starting at 1 MiB) as one available region.
        info.mmap_register_available(0x0010_0000, mb.mem_upper * 1024);
    }

    if mb.flags & 0b100_0000 != 0 {
        let mut cursor = mb.mmap_addr;
        let end = mb.mmap_addr + mb.mmap_length;
        while cursor < end {
            // SAFETY: `cursor` stays within `[mmap_addr, mmap_addr + mmap_length)`,
            // which the loader guarantees is a live, readable mmap buffer.
            let entry = unsafe { &*(cursor as *const MultibootMmapEntry) };
            let base = entry.base_addr as u32;
            let size = entry.length as u32;
            match entry.kind {
                MULTIBOOT_MEMORY_AVAILABLE => {
                    info.mmap_register_available(base, size);
                }
                0 => break,
                _ => {
                    info.mmap_register_reserved(base, size);
                }
            }
            cursor += entry.size + 4;
        }
    }

    if mb.flags & 0b1000 != 0 && mb.mods_count > 0 {
        // (bit 3: `mods_count`/`mods_addr` valid.)
        let mut addr = mb.mods_addr;
        for _ in 0..mb.mods_count {
            // SAFETY: `mods_addr..mods_addr + mods_count * size_of::<MultibootModule>()`
            // is guaranteed live by the loader when `flags` bit 3 is set.
            let module = unsafe { &*(addr as *const MultibootModule) };
            // SAFETY: delegated to `read_cstr`'s safety doc; `cmdline` is
            // either 0 or a loader-supplied NUL-terminated string.
            let cmdline = unsafe { read_cstr(module.cmdline, 256) };
            info.kmod_register(module.mod_start, module.mod_end - module.mod_start, cmdline);
            addr += core::mem::size_of::<MultibootModule>() as u32;
        }
    }

    info
}
