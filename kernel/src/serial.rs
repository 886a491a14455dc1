//! The platform write sink (C11) `klog::klog_setup` is handed at boot: a
//! 16550 UART on COM1. Writes go out raw, byte for byte — `klog`'s ring
//! buffer already does the buffering, this just drains it to the wire.

use crate::klog::Sink;

#[cfg(target_os = "none")]
pub struct Uart16550 {
    inner: spin::Mutex<uart_16550::SerialPort>,
}

#[cfg(target_os = "none")]
impl Uart16550 {
    /// # Safety
    /// `base` must be a COM port's I/O base address, and no other code may
    /// address it concurrently with this instance.
    pub const unsafe fn new(base: u16) -> Self {
        // SAFETY: delegated to this function's safety doc.
        let port = unsafe { uart_16550::SerialPort::new(base) };
        Self {
            inner: spin::Mutex::new(port),
        }
    }

    pub fn init(&self) {
        self.inner.lock().init();
    }
}

#[cfg(target_os = "none")]
impl Sink for Uart16550 {
    fn write(&self, bytes: &[u8]) {
        use core::fmt::Write;
        let mut port = self.inner.lock();
        for &b in bytes {
            let _ = port.write_char(b as char);
        }
    }
}

#[cfg(target_os = "none")]
pub static COM1: Uart16550 = unsafe { Uart16550::new(0x3F8) };

/// Host test builds have no UART; writes go to the process's own stdout so
/// a developer running `cargo test` still sees kernel log output.
#[cfg(not(target_os = "none"))]
pub struct HostSink;

#[cfg(not(target_os = "none"))]
impl Sink for HostSink {
    fn write(&self, bytes: &[u8]) {
        use std::io::Write;
        let _ = std::io::stdout().write_all(bytes);
    }
}

#[cfg(not(target_os = "none"))]
pub static COM1: HostSink = HostSink;
