//! Kernel log (C11): a fixed-size ring buffer that doubles as the backing
//! store for the `log` crate facade (C15/§10.1).
//!
//! Writes never block and never allocate: `klog_write` copies into the ring
//! buffer under a single spinlock, overwriting the oldest bytes once full.
//! Flushing to the platform sink is a separate, explicit step so that a
//! burst of writes from, say, a panic handler never stalls on device I/O.

use core::fmt::{self, Write};

use crate::config::{KBUFFER_SIZE, KLOG_SIZE};
use crate::sync::Spinlock;

/// Where a flushed chunk of the ring buffer ultimately goes. Implemented by
/// the real console/UART driver on bare metal and by an in-memory recorder
/// under `#[cfg(test)]`, mirroring the arch layer's host-testability split.
pub trait Sink {
    fn write(&self, bytes: &[u8]);
}

struct NullSink;

impl Sink for NullSink {
    fn write(&self, _bytes: &[u8]) {}
}

struct RingBuffer {
    buf: [u8; KLOG_SIZE],
    head: usize,
    tail: usize,
    count: usize,
}

impl RingBuffer {
    const fn new() -> Self {
        Self {
            buf: [0; KLOG_SIZE],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.buf[self.tail] = b;
            self.tail = (self.tail + 1) % KLOG_SIZE;
            if self.count == KLOG_SIZE {
                self.head = (self.head + 1) % KLOG_SIZE;
            } else {
                self.count += 1;
            }
        }
    }

    fn drain_chunk(&mut self, out: &mut [u8; KBUFFER_SIZE]) -> usize {
        let n = self.count.min(KBUFFER_SIZE);
        for slot in out.iter_mut().take(n) {
            *slot = self.buf[self.head];
            self.head = (self.head + 1) % KLOG_SIZE;
        }
        self.count -= n;
        n
    }
}

struct State {
    ring: RingBuffer,
    sink: &'static dyn Sink,
}

static STATE: Spinlock<State> = Spinlock::new(State {
    ring: RingBuffer::new(),
    sink: &NullSink,
});

/// Installs the platform write sink. Must run once during boot (C13 stage
/// 0) before any other component logs.
pub fn klog_setup(sink: &'static dyn Sink) {
    STATE.lock().sink = sink;
}

/// Copies `bytes` into the ring buffer. Never blocks on the sink.
pub fn klog_write(bytes: &[u8]) {
    STATE.lock().ring.push(bytes);
}

/// Drains the ring buffer to the installed sink in `KBUFFER_SIZE` chunks.
pub fn klog_flush() {
    loop {
        let mut chunk = [0u8; KBUFFER_SIZE];
        let (n, sink) = {
            let mut guard = STATE.lock();
            let n = guard.ring.drain_chunk(&mut chunk);
            (n, guard.sink)
        };
        if n == 0 {
            return;
        }
        sink.write(&chunk[..n]);
    }
}

/// A no-alloc formatting target that writes straight into the ring buffer,
/// truncating silently past its fixed capacity rather than allocating.
struct KlogWriter {
    buf: [u8; KBUFFER_SIZE],
    len: usize,
}

impl Write for KlogWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = KBUFFER_SIZE - self.len;
        let take = remaining.min(s.len());
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// The `log::Log` implementation backing every `log::info!`/`warn!`/etc.
/// call in the nucleus. Formats `"[LEVEL][module] msg"`, trimmed to fit a
/// no-alloc buffer, matching the original formatter's
/// `"[LEVEL][kernel][file] func(): msg"` convention.
pub struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut w = KlogWriter {
            buf: [0; KBUFFER_SIZE],
            len: 0,
        };
        let _ = write!(
            w,
            "[{}][{}] {}\n",
            record.level(),
            record.target(),
            record.args()
        );
        klog_write(&w.buf[..w.len]);
    }

    fn flush(&self) {
        klog_flush();
    }
}

static LOGGER: KernelLogger = KernelLogger;

/// Installs [`KernelLogger`] as the `log` crate's global logger and sets the
/// compiled-in max level (`Info` in release, `Trace` under `#[cfg(test)]`).
///
/// # Safety
/// Must run exactly once, before any `log::` macro is used.
pub fn init() {
    let _ = log::set_logger(&LOGGER);
    if cfg!(test) {
        log::set_max_level(log::LevelFilter::Trace);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `STATE` is shared process-wide; serialize tests through it.
    static TEST_LOCK: Spinlock<()> = Spinlock::new(());

    struct RecordingSink {
        // Tests only need to see that flush happened; a boxed recorder
        // would need `alloc`, so this sink just counts bytes.
        received: Spinlock<usize>,
    }

    impl Sink for RecordingSink {
        fn write(&self, bytes: &[u8]) {
            *self.received.lock() += bytes.len();
        }
    }

    #[test]
    fn write_then_flush_drains_to_the_sink() {
        let _serial = TEST_LOCK.lock();
        static SINK: RecordingSink = RecordingSink {
            received: Spinlock::new(0),
        };
        klog_setup(&SINK);
        klog_write(b"hello");
        klog_flush();
        assert_eq!(*SINK.received.lock(), 5);
        klog_setup(&NullSink);
    }

    #[test]
    fn overflowing_the_ring_drops_the_oldest_bytes() {
        let _serial = TEST_LOCK.lock();
        static SINK: RecordingSink = RecordingSink {
            received: Spinlock::new(0),
        };
        klog_setup(&SINK);
        let big = [b'x'; KLOG_SIZE + 10];
        klog_write(&big);
        klog_flush();
        assert_eq!(*SINK.received.lock(), KLOG_SIZE);
        klog_setup(&NullSink);
    }
}
