#![no_std]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use core::panic::PanicInfo;

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    nucleus::kpanic!("{info}")
}

/// Reached from `boot.S`'s `_start` with the multiboot magic in `eax` and the
/// multiboot info structure's physical address in `ebx`. Builds a
/// `BootInfo` from them and hands off to the boot sequence. Never returns.
///
/// # Safety
/// Must be called exactly once, by `_start`, with the real register values
/// the multiboot loader passed to it.
#[cfg(target_os = "none")]
#[no_mangle]
unsafe extern "C" fn kernel_main(magic: u32, info_addr: u32) -> ! {
    // SAFETY: delegated to this function's safety doc.
    let info = unsafe { nucleus::multiboot::parse(magic, info_addr) };
    // SAFETY: the very first thing this function does, before any other
    // subsystem has touched global state.
    unsafe { nucleus::bootstrap::boot(&info, &nucleus::process::UnimplementedLoader) }
}

#[cfg(not(target_os = "none"))]
fn main() {}
