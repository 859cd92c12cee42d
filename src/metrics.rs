//! Drop counters and diagnostic reporting (C9).
//!
//! The two single-reader buffers (demod-IQ, PCM) each need their own drop
//! counter, incremented by the writing thread whenever a write returns
//! fewer bytes than offered. The two readers of the raw-IQ buffer already
//! keep their own per-reader drop counts (see [`crate::buffers::multi_reader`]);
//! [`DropSnapshot`] combines all four into one reportable value.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic drop-byte counters for the two single-reader buffers.
#[derive(Default)]
pub struct DropCounters {
    pub demod_iq: AtomicU64,
    pub pcm: AtomicU64,
}

impl DropCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_demod_iq(&self, n: u64) {
        self.demod_iq.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_pcm(&self, n: u64) {
        self.pcm.fetch_add(n, Ordering::Relaxed);
    }

    pub fn demod_iq(&self) -> u64 {
        self.demod_iq.load(Ordering::Relaxed)
    }

    pub fn pcm(&self) -> u64 {
        self.pcm.load(Ordering::Relaxed)
    }
}

/// Cumulative drop totals across all four buffers, eventually consistent
/// with respect to the reporting thread (relaxed loads, no synchronization
/// with the writers).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropSnapshot {
    pub raw_iq: u64,
    pub demod_iq: u64,
    pub pcm: u64,
    pub psd: u64,
}

impl std::fmt::Display for DropSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "raw_iq={} demod_iq={} pcm={} psd={}",
            self.raw_iq, self.demod_iq, self.pcm, self.psd
        )
    }
}
