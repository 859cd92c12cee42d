//! Single-producer/multi-consumer byte ring buffer.
//!
//! One writer (the RF front-end's device callback) and two independent
//! readers, the decimator and the PSD engine, each tracking their own
//! tail. When free space runs short the writer advances (drops) the
//! *slowest* reader's tail until enough room is freed; on a tie the PSD
//! reader is the victim, since the audio path must never starve for the
//! sake of the spectrum display.

use std::sync::{Condvar, Mutex};

/// Identifies one of the two readers of a [`MultiReaderRingBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reader {
    Demod,
    Psd,
}

struct Inner {
    buf: Vec<u8>,
    head: u64,
    tail_demod: u64,
    tail_psd: u64,
    drop_demod_bytes: u64,
    drop_psd_bytes: u64,
}

impl Inner {
    fn tail(&self, who: Reader) -> u64 {
        match who {
            Reader::Demod => self.tail_demod,
            Reader::Psd => self.tail_psd,
        }
    }

    fn advance_tail(&mut self, who: Reader, n: u64) {
        match who {
            Reader::Demod => self.tail_demod += n,
            Reader::Psd => self.tail_psd += n,
        }
    }

    fn add_drop(&mut self, who: Reader, n: u64) {
        match who {
            Reader::Demod => self.drop_demod_bytes += n,
            Reader::Psd => self.drop_psd_bytes += n,
        }
    }

    fn available(&self, who: Reader) -> u64 {
        self.head - self.tail(who)
    }

    fn min_tail(&self) -> u64 {
        self.tail_demod.min(self.tail_psd)
    }

    fn used(&self) -> u64 {
        self.head - self.min_tail()
    }

    fn free(&self, capacity: u64) -> u64 {
        let used = self.used();
        if used >= capacity {
            0
        } else {
            capacity - used
        }
    }

    /// The slowest reader is the victim; PSD wins ties (it is dropped first).
    fn choose_victim(&self) -> Reader {
        if self.tail_psd <= self.tail_demod {
            Reader::Psd
        } else {
            Reader::Demod
        }
    }
}

pub struct MultiReaderRingBuffer {
    capacity: u64,
    inner: Mutex<Inner>,
    cv: Condvar,
}

impl MultiReaderRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity as u64,
            inner: Mutex::new(Inner {
                buf: vec![0u8; capacity],
                head: 0,
                tail_demod: 0,
                tail_psd: 0,
                drop_demod_bytes: 0,
                drop_psd_bytes: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Writes `data`, dropping from the slowest reader's tail as needed to
    /// make room. If `data` itself exceeds capacity, only its last
    /// `capacity` bytes are retained. Never blocks.
    pub fn write(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        let cap = self.capacity as usize;
        let data = if data.len() > cap {
            &data[data.len() - cap..]
        } else {
            data
        };
        let len = data.len() as u64;

        let freeb = inner.free(self.capacity);
        if freeb < len {
            let mut need = len - freeb;
            while need > 0 {
                let victim = inner.choose_victim();
                let victim_av = inner.available(victim);
                if victim_av == 0 {
                    break;
                }
                let step = need.min(victim_av);
                inner.advance_tail(victim, step);
                inner.add_drop(victim, step);
                need -= step;
            }
        }

        let cap = self.capacity as usize;
        let head_idx = (inner.head % self.capacity) as usize;
        let chunk1 = data.len().min(cap - head_idx);
        let chunk2 = data.len() - chunk1;
        inner.buf[head_idx..head_idx + chunk1].copy_from_slice(&data[..chunk1]);
        if chunk2 > 0 {
            inner.buf[..chunk2].copy_from_slice(&data[chunk1..]);
        }
        inner.head += len;

        drop(inner);
        self.cv.notify_all();
    }

    /// Non-blocking read for reader `who`: copies up to `min(out.len(), available)`.
    pub fn read(&self, who: Reader, out: &mut [u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        self.read_locked(&mut inner, who, out)
    }

    /// Blocks until `out.len()` bytes are available for `who` or `stop` returns true.
    pub fn read_blocking(&self, who: Reader, out: &mut [u8], stop: &dyn Fn() -> bool) -> usize {
        let mut inner = self.inner.lock().unwrap();
        while !stop() && inner.available(who) < out.len() as u64 {
            inner = self.cv.wait(inner).unwrap();
        }
        if stop() {
            return 0;
        }
        self.read_locked(&mut inner, who, out)
    }

    fn read_locked(&self, inner: &mut Inner, who: Reader, out: &mut [u8]) -> usize {
        let av = inner.available(who).min(out.len() as u64) as usize;
        if av == 0 {
            return 0;
        }
        let cap = self.capacity as usize;
        let tail_idx = (inner.tail(who) % self.capacity) as usize;
        let chunk1 = av.min(cap - tail_idx);
        let chunk2 = av - chunk1;
        out[..chunk1].copy_from_slice(&inner.buf[tail_idx..tail_idx + chunk1]);
        if chunk2 > 0 {
            out[chunk1..av].copy_from_slice(&inner.buf[..chunk2]);
        }
        inner.advance_tail(who, av as u64);
        av
    }

    pub fn available(&self, who: Reader) -> u64 {
        self.inner.lock().unwrap().available(who)
    }

    pub fn drops(&self, who: Reader) -> u64 {
        let inner = self.inner.lock().unwrap();
        match who {
            Reader::Demod => inner.drop_demod_bytes,
            Reader::Psd => inner.drop_psd_bytes,
        }
    }

    /// Broadcasts on the condition variable, releasing blocked readers at shutdown.
    pub fn wake_all(&self) {
        let _inner = self.inner.lock().unwrap();
        self.cv.notify_all();
    }
}
