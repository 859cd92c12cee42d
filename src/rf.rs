//! The RF front-end capability consumed by the orchestrator.
//!
//! Out of scope per the design: device enumeration and tuning are external.
//! This crate only needs the minimal capability set to start/stop a
//! callback-driven IQ stream, plus an in-memory test double that plays back
//! synthetic IQ so the pipeline can be exercised without real hardware.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::DemodMode;

/// Gain and tuning controls applied before `start_rx`.
#[derive(Debug, Clone, Copy)]
pub struct FrontEndGains {
    pub lna_gain: u32,
    pub vga_gain: u32,
    pub amp_enabled: bool,
}

/// Minimal capability set the orchestrator needs from a radio device.
pub trait RfFrontEnd: Send {
    fn open(&mut self) -> io::Result<()>;
    fn set_sample_rate(&mut self, hz: u32) -> io::Result<()>;
    fn set_center_freq(&mut self, hz: u64, ppm_error: f64) -> io::Result<()>;
    fn set_gains(&mut self, gains: FrontEndGains) -> io::Result<()>;

    /// Starts delivering interleaved int8 IQ bytes to `callback` from a
    /// device-owned thread until `stop_rx` is called. The callback must
    /// never block, allocate, or call back into the front-end.
    fn start_rx(&mut self, callback: Box<dyn FnMut(&[i8]) + Send>) -> io::Result<()>;
    fn stop_rx(&mut self) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

/// Applies `ppm_error` the same way the device HAL does: `corrected =
/// target * (1 + ppm_error / 1e6)`.
pub fn apply_ppm_correction(target_hz: u64, ppm_error: f64) -> u64 {
    ((target_hz as f64) * (1.0 + ppm_error / 1e6)).round() as u64
}

/// Reinterprets a buffer of signed IQ bytes as unsigned bytes for storage in
/// a ring buffer, without copying. `i8` and `u8` share layout and alignment,
/// so this is a sound reinterpretation of the same bits.
pub fn iq_bytes_as_u8(iq: &[i8]) -> &[u8] {
    // SAFETY: i8 and u8 have identical size and alignment; this only
    // reinterprets the bit pattern, it does not read it as any other type.
    unsafe { std::slice::from_raw_parts(iq.as_ptr() as *const u8, iq.len()) }
}

/// An in-memory `RfFrontEnd` that generates a synthetic tone (FM mode) or
/// amplitude-modulated carrier (AM mode) on its own thread, at roughly the
/// configured sample rate, in 10ms chunks. Stands in for real hardware so
/// the pipeline can run end-to-end without a device driver.
pub struct SyntheticRfFrontEnd {
    mode: DemodMode,
    sample_rate_hz: u32,
    center_freq_hz: u64,
    gains: FrontEndGains,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyntheticRfFrontEnd {
    pub fn new(mode: DemodMode) -> Self {
        Self {
            mode,
            sample_rate_hz: 1,
            center_freq_hz: 0,
            gains: FrontEndGains {
                lna_gain: 0,
                vga_gain: 0,
                amp_enabled: false,
            },
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl RfFrontEnd for SyntheticRfFrontEnd {
    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn set_sample_rate(&mut self, hz: u32) -> io::Result<()> {
        self.sample_rate_hz = hz.max(1);
        Ok(())
    }

    fn set_center_freq(&mut self, hz: u64, ppm_error: f64) -> io::Result<()> {
        self.center_freq_hz = apply_ppm_correction(hz, ppm_error);
        Ok(())
    }

    fn set_gains(&mut self, gains: FrontEndGains) -> io::Result<()> {
        self.gains = gains;
        Ok(())
    }

    fn start_rx(&mut self, mut callback: Box<dyn FnMut(&[i8]) + Send>) -> io::Result<()> {
        self.stop.store(false, Ordering::Release);
        let stop = Arc::clone(&self.stop);
        let sample_rate_hz = self.sample_rate_hz;
        let mode = self.mode;

        let handle = thread::Builder::new().name("rf-synth".into()).spawn(move || {
            let chunk_samples = (sample_rate_hz / 100).max(1) as usize; // ~10ms chunks
            let two_pi = std::f64::consts::TAU;
            let tone_hz = 10_000.0f64;
            let mod_hz = 1_000.0f64;
            let mut phase = 0.0f64;
            let mut buf = vec![0i8; chunk_samples * 2];
            let mut sample_index: u64 = 0;

            while !stop.load(Ordering::Acquire) {
                for n in 0..chunk_samples {
                    let t = sample_index as f64 / sample_rate_hz as f64;
                    let (i, q) = match mode {
                        DemodMode::Fm => {
                            phase += two_pi * tone_hz / sample_rate_hz as f64;
                            (phase.cos(), phase.sin())
                        }
                        DemodMode::Am => {
                            let envelope = 1.0 + 0.5 * (two_pi * mod_hz * t).sin();
                            (envelope, 0.0)
                        }
                    };
                    buf[n * 2] = (i * 100.0).clamp(-127.0, 127.0) as i8;
                    buf[n * 2 + 1] = (q * 100.0).clamp(-127.0, 127.0) as i8;
                    sample_index += 1;
                }
                callback(&buf);
                thread::sleep(Duration::from_millis(10));
            }
        })?;

        self.handle = Some(handle);
        Ok(())
    }

    fn stop_rx(&mut self) -> io::Result<()> {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
