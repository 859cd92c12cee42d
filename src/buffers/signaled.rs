//! Single-producer/single-consumer byte ring buffer with blocking reads.
//!
//! One writer, one reader, per instance. Writes never block and never fail;
//! a write that would overflow the free space copies only what fits and
//! reports the deficit to the caller. Reads either return immediately with
//! whatever is available, or block on a condition variable until either `n`
//! bytes are available or shutdown is signaled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

struct Inner {
    queue: VecDeque<u8>,
    capacity: usize,
}

/// A blocking, drop-on-full byte ring buffer shared by exactly one writer
/// thread and one reader thread.
pub struct SignaledRingBuffer {
    inner: Mutex<Inner>,
    cv: Condvar,
    stop: AtomicBool,
}

impl SignaledRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                capacity,
            }),
            cv: Condvar::new(),
            stop: AtomicBool::new(false),
        }
    }

    /// Copies up to free-capacity bytes from `bytes`; returns the number
    /// actually written. Never blocks, never fails. The caller is
    /// responsible for accounting for any deficit (typically as a drop
    /// counter), per the buffer's drop-on-full policy.
    pub fn write(&self, bytes: &[u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let free = inner.capacity - inner.queue.len();
        let n = bytes.len().min(free);
        inner.queue.extend(&bytes[..n]);
        drop(inner);
        if n > 0 {
            self.cv.notify_one();
        }
        n
    }

    /// Non-blocking read: copies up to `min(out.len(), available)` bytes.
    pub fn read(&self, out: &mut [u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let n = out.len().min(inner.queue.len());
        for slot in out.iter_mut().take(n) {
            *slot = inner.queue.pop_front().unwrap();
        }
        n
    }

    /// Blocks until `out.len()` bytes are available or `stop()` has been
    /// called; returns 0 on stop, otherwise exactly `out.len()` bytes.
    pub fn read_blocking(&self, out: &mut [u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        while !self.stop.load(Ordering::Acquire) && inner.queue.len() < out.len() {
            inner = self.cv.wait(inner).unwrap();
        }
        if self.stop.load(Ordering::Acquire) {
            return 0;
        }
        for slot in out.iter_mut() {
            *slot = inner.queue.pop_front().unwrap();
        }
        out.len()
    }

    /// Number of bytes currently available to read.
    pub fn available(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    /// Discards all buffered bytes without changing the stop flag.
    pub fn reset(&self) {
        self.inner.lock().unwrap().queue.clear();
    }

    /// Asserts the shutdown flag; does not itself wake waiters (call
    /// `wake_all` for that) so callers can assert stop on many buffers
    /// before broadcasting.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Broadcasts on the condition variable, releasing every blocked
    /// `read_blocking` call. Used at shutdown after `stop()`.
    pub fn wake_all(&self) {
        let _inner = self.inner.lock().unwrap();
        self.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn write_then_read_round_trips() {
        let rb = SignaledRingBuffer::new(16);
        assert_eq!(rb.write(&[1, 2, 3, 4]), 4);
        let mut out = [0u8; 4];
        assert_eq!(rb.read(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn write_reports_deficit_on_overflow() {
        let rb = SignaledRingBuffer::new(4);
        assert_eq!(rb.write(&[1, 2, 3, 4, 5, 6]), 4);
    }

    #[test]
    fn read_blocking_wakes_on_write() {
        let rb = Arc::new(SignaledRingBuffer::new(16));
        let writer = Arc::clone(&rb);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.write(&[9, 9]);
        });
        let mut out = [0u8; 2];
        let n = rb.read_blocking(&mut out);
        assert_eq!(n, 2);
        assert_eq!(out, [9, 9]);
        handle.join().unwrap();
    }

    #[test]
    fn read_blocking_returns_zero_on_stop() {
        let rb = Arc::new(SignaledRingBuffer::new(16));
        let stopper = Arc::clone(&rb);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stopper.stop();
            stopper.wake_all();
        });
        let mut out = [0u8; 4];
        let n = rb.read_blocking(&mut out);
        assert_eq!(n, 0);
        handle.join().unwrap();
    }

    #[test]
    fn fifo_order_holds_under_arbitrary_chunking() {
        let rb = SignaledRingBuffer::new(256);
        let written: Vec<u8> = (0..=255u8).collect();
        for chunk in written.chunks(17) {
            assert_eq!(rb.write(chunk), chunk.len());
        }
        let mut read_back = Vec::new();
        let mut buf = [0u8; 9];
        while rb.available() > 0 {
            let want = buf.len().min(rb.available());
            let n = rb.read(&mut buf[..want]);
            read_back.extend_from_slice(&buf[..n]);
        }
        assert_eq!(read_back, written);
    }
}
