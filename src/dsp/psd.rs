//! Welch-method power spectral density estimator.
//!
//! Consumes one contiguous ~1 second block of interleaved int8 IQ bytes,
//! converts it to complex double-precision samples, runs an averaged
//! windowed periodogram, scales the result to the requested unit, crops it
//! to the configured span, and shifts the frequency axis to absolute Hz.

use std::io::Write;

use num_complex::Complex64;
use rustfft::FftPlanner;

use super::window::WindowType;

/// Output unit for scaled PSD values. `Linear` ("lin") is not part of the
/// session configuration's `scale` option but is supported here as the
/// natural unscaled representation, and is used by the white-noise Parseval
/// test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleUnit {
    DBm,
    DBuV,
    DBmV,
    W,
    V,
    Linear,
}

impl ScaleUnit {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "dBm" => ScaleUnit::DBm,
            "dBuV" => ScaleUnit::DBuV,
            "dBmV" => ScaleUnit::DBmV,
            "W" => ScaleUnit::W,
            "V" => ScaleUnit::V,
            "lin" => ScaleUnit::Linear,
            _ => return None,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            ScaleUnit::DBm => "dBm",
            ScaleUnit::DBuV => "dBuV",
            ScaleUnit::DBmV => "dBmV",
            ScaleUnit::W => "W",
            ScaleUnit::V => "V",
            ScaleUnit::Linear => "lin",
        }
    }
}

/// Assumed load impedance for dBm/W/V conversions.
const LOAD_OHMS: f64 = 50.0;
const DBM_FLOOR: f64 = -200.0;

/// Converts one linear PSD value (W/Hz, referenced to `LOAD_OHMS`) to the
/// requested display unit.
pub fn scale_psd(p_linear: f64, unit: ScaleUnit) -> f64 {
    let dbm = (10.0 * ((p_linear / LOAD_OHMS) * 1000.0).log10()).max(DBM_FLOOR);
    match unit {
        ScaleUnit::DBm => dbm,
        ScaleUnit::DBuV => dbm + 107.0,
        ScaleUnit::DBmV => dbm + 47.0,
        ScaleUnit::W => p_linear / LOAD_OHMS,
        ScaleUnit::V => p_linear.sqrt(),
        ScaleUnit::Linear => p_linear,
    }
}

/// A fully-resolved PSD job: everything needed to run one Welch cycle.
#[derive(Debug, Clone)]
pub struct PsdConfig {
    pub window: WindowType,
    pub sample_rate_hz: f64,
    pub nperseg: usize,
    pub noverlap: usize,
    pub scale: ScaleUnit,
    pub span_hz: f64,
    pub center_freq_hz: f64,
}

impl PsdConfig {
    /// Derives `nperseg` as the smallest power of two satisfying
    /// `ENBW(window) * sample_rate / rbw <= nperseg`.
    pub fn nperseg_for_rbw(window: WindowType, sample_rate_hz: f64, rbw_hz: f64) -> usize {
        let target = window.enbw_factor() * sample_rate_hz / rbw_hz;
        let mut nperseg = 1usize;
        while (nperseg as f64) < target {
            nperseg <<= 1;
        }
        nperseg.max(1)
    }

    pub fn new(
        window: WindowType,
        sample_rate_hz: f64,
        rbw_hz: f64,
        overlap: f64,
        scale: ScaleUnit,
        span_hz: f64,
        center_freq_hz: f64,
    ) -> Self {
        let nperseg = Self::nperseg_for_rbw(window, sample_rate_hz, rbw_hz);
        let noverlap = (overlap * nperseg as f64).floor() as usize;
        Self {
            window,
            sample_rate_hz,
            nperseg,
            noverlap,
            scale,
            span_hz,
            center_freq_hz,
        }
    }
}

/// One retained (frequency, scaled-power) output bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsdBin {
    pub freq_hz: f64,
    pub power: f64,
}

/// Converts a raw interleaved int8 IQ byte buffer into complex samples,
/// scaling each byte to `[-1.0, 1.0]` by dividing by 128.
pub fn load_iq_from_bytes(buf: &[i8]) -> Vec<Complex64> {
    buf.chunks_exact(2)
        .map(|pair| {
            let i = pair[0] as f64 / 128.0;
            let q = pair[1] as f64 / 128.0;
            Complex64::new(i, q)
        })
        .collect()
}

/// Runs the Welch estimator over `signal`, returning absolute (uncropped,
/// unshifted) linear PSD bins centered on zero frequency.
pub fn execute_welch_psd(signal: &[Complex64], cfg: &PsdConfig) -> Vec<PsdBin> {
    let nperseg = cfg.nperseg;
    let step = nperseg - cfg.noverlap;
    if signal.len() < nperseg || step == 0 {
        return Vec::new();
    }
    let k_segments = (signal.len() - cfg.noverlap) / step;

    let window = cfg.window.generate(nperseg);
    let u: f64 = window.iter().map(|w| w * w).sum::<f64>() / nperseg as f64;

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);

    let mut accum = vec![0.0f64; nperseg];
    let mut scratch = vec![Complex64::new(0.0, 0.0); nperseg];

    for seg in 0..k_segments {
        let start = seg * step;
        for n in 0..nperseg {
            scratch[n] = signal[start + n] * window[n];
        }
        fft.process(&mut scratch);
        for (bin, sample) in accum.iter_mut().zip(scratch.iter()) {
            *bin += sample.norm_sqr();
        }
    }

    let norm = 1.0 / (cfg.sample_rate_hz * u * k_segments as f64 * nperseg as f64);
    for bin in accum.iter_mut() {
        *bin *= norm;
    }

    // fftshift: bin 0 holds DC; bins [nperseg/2, nperseg) are negative freqs.
    let half = nperseg / 2;
    let mut shifted = Vec::with_capacity(nperseg);
    shifted.extend_from_slice(&accum[half..]);
    shifted.extend_from_slice(&accum[..half]);

    shifted
        .into_iter()
        .enumerate()
        .map(|(i, power)| PsdBin {
            freq_hz: -cfg.sample_rate_hz / 2.0 + i as f64 * cfg.sample_rate_hz / nperseg as f64,
            power,
        })
        .collect()
}

/// Scales every bin to `cfg.scale`, crops to `|freq| <= span/2`, and shifts
/// frequencies to absolute Hz around `cfg.center_freq_hz`.
pub fn scale_and_crop(bins: &[PsdBin], cfg: &PsdConfig) -> Vec<PsdBin> {
    let half_span = cfg.span_hz / 2.0;
    bins.iter()
        .filter(|b| b.freq_hz >= -half_span && b.freq_hz <= half_span)
        .map(|b| PsdBin {
            freq_hz: b.freq_hz + cfg.center_freq_hz,
            power: scale_psd(b.power, cfg.scale),
        })
        .collect()
}

/// Writes the CSV spectrum: header `freq_hz,psd_<unit>`, one row per bin,
/// frequency with 6 decimal digits and power in 12-significant-digit
/// scientific notation.
pub fn write_csv<W: Write>(mut out: W, bins: &[PsdBin], unit: ScaleUnit) -> std::io::Result<()> {
    writeln!(out, "freq_hz,psd_{}", unit.label())?;
    for bin in bins {
        writeln!(out, "{:.6},{:.12e}", bin.freq_hz, bin.power)?;
    }
    Ok(())
}
