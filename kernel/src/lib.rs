//! A single-node x86 microkernel nucleus: fixed-size process/thread tables,
//! cooperative round-robin-with-aging scheduling, and one kernel-call
//! dispatcher shared between every user thread and a dedicated service
//! thread. See `bootstrap` for the boot sequence that wires it all together.

#![no_std]

#[cfg(not(target_os = "none"))]
extern crate std;

pub mod arch;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod identity;
pub mod irq;
pub mod kargs;
pub mod kcall;
pub mod klog;
pub mod mm;
#[cfg(target_os = "none")]
pub mod multiboot;
pub mod process;
pub mod sched;
pub mod serial;
pub mod sync;
