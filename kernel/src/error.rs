//! Kernel error taxonomy.
//!
//! Every fallible operation in the nucleus returns [`KernelResult`]. The
//! seven kinds below are numerically stable across releases because they
//! cross the kernel-call ABI as a signed machine word (see [`KernelError::errno`]).

use core::fmt;

/// A kernel-call-level error.
///
/// Each variant carries whatever context it was raised with, so a caller
/// does not need a side-channel to explain what failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// Argument violates a precondition.
    Inval { reason: &'static str },
    /// A pointer argument does not refer to caller-accessible memory.
    Fault { addr: usize },
    /// A frame or kernel-page pool is exhausted.
    Nomem { resource: &'static str },
    /// The caller's identity failed an authorization check.
    Perm { operation: &'static str },
    /// Resource temporarily unavailable (e.g. all thread slots full).
    Again { resource: &'static str },
    /// Lock already held; surfaced only by `trylock`-style operations.
    Busy,
    /// Unknown kernel-call number.
    Nosys { kcall_nr: usize },
}

/// Result type alias used throughout the nucleus.
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Maps this error to the signed machine word returned across the
    /// kernel-call ABI. Negative values are reserved for errors; successful
    /// results are always `>= 0`.
    pub const fn errno(&self) -> isize {
        match self {
            Self::Inval { .. } => -1,
            Self::Fault { .. } => -2,
            Self::Nomem { .. } => -3,
            Self::Perm { .. } => -4,
            Self::Again { .. } => -5,
            Self::Busy => -6,
            Self::Nosys { .. } => -7,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inval { reason } => write!(f, "invalid argument: {reason}"),
            Self::Fault { addr } => write!(f, "fault: inaccessible address 0x{addr:08x}"),
            Self::Nomem { resource } => write!(f, "out of memory: {resource} exhausted"),
            Self::Perm { operation } => write!(f, "permission denied: {operation}"),
            Self::Again { resource } => write!(f, "resource temporarily unavailable: {resource}"),
            Self::Busy => write!(f, "resource busy"),
            Self::Nosys { kcall_nr } => write!(f, "unknown kernel call {kcall_nr}"),
        }
    }
}

use crate::sync::Spinlock;

/// The platform `hlt`-loop, injected at boot (C13) so this module does not
/// depend on `arch` directly. Defaults to a busy spin loop so host tests and
/// any call before boot stage 0 still terminate the calling thread.
static HALT: Spinlock<Option<fn() -> !>> = Spinlock::new(None);

/// Installs the platform halt routine `kpanic!` calls into after logging.
pub fn set_halt(halt: fn() -> !) {
    *HALT.lock() = Some(halt);
}

/// Logs a formatted fatal message at `error` level, flushes the kernel log,
/// then halts. Never returns. The fatal conditions in §7 (unrecognized
/// exception, double fault, corrupt descriptor table, unrecoverable
/// reference-count underflow) all route through this.
#[doc(hidden)]
pub fn kpanic_impl(args: core::fmt::Arguments<'_>) -> ! {
    log::error!("{args}");
    crate::klog::klog_flush();
    match *HALT.lock() {
        Some(halt) => halt(),
        None => loop {
            core::hint::spin_loop();
        },
    }
}

/// Halts immediately, without logging at `error` level. Used by the
/// `shutdown` kernel call, which is an orderly stop, not a fatal condition.
pub fn halt_now() -> ! {
    crate::klog::klog_flush();
    match *HALT.lock() {
        Some(halt) => halt(),
        None => loop {
            core::hint::spin_loop();
        },
    }
}

/// Logs a formatted fatal message and halts. See [`kpanic_impl`].
#[macro_export]
macro_rules! kpanic {
    ($($arg:tt)*) => {
        $crate::error::kpanic_impl(format_args!($($arg)*))
    };
}

/// Builds a [`KernelError`] variant without repeating the module path at the
/// call site, mirroring the common "quick, situated error" case.
#[macro_export]
macro_rules! kernel_error {
    (Inval, $reason:expr) => {
        $crate::error::KernelError::Inval { reason: $reason }
    };
    (Fault, $addr:expr) => {
        $crate::error::KernelError::Fault { addr: $addr }
    };
    (Nomem, $resource:expr) => {
        $crate::error::KernelError::Nomem {
            resource: $resource,
        }
    };
    (Perm, $operation:expr) => {
        $crate::error::KernelError::Perm {
            operation: $operation,
        }
    };
    (Again, $resource:expr) => {
        $crate::error::KernelError::Again {
            resource: $resource,
        }
    };
    (Busy) => {
        $crate::error::KernelError::Busy
    };
    (Nosys, $nr:expr) => {
        $crate::error::KernelError::Nosys { kcall_nr: $nr }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_values_are_negative_and_distinct() {
        let errs = [
            KernelError::Inval { reason: "x" },
            KernelError::Fault { addr: 0 },
            KernelError::Nomem { resource: "x" },
            KernelError::Perm { operation: "x" },
            KernelError::Again { resource: "x" },
            KernelError::Busy,
            KernelError::Nosys { kcall_nr: 999 },
        ];
        let mut seen = std::collections::HashSet::new();
        for e in errs {
            assert!(e.errno() < 0);
            assert!(seen.insert(e.errno()));
        }
    }

    #[test]
    fn display_includes_context() {
        let e = KernelError::Fault { addr: 0xdead_beef };
        let s = alloc_free_format(&e);
        assert!(s.contains("deadbeef"));
    }

    fn alloc_free_format(e: &KernelError) -> std::string::String {
        std::format!("{e}")
    }
}
