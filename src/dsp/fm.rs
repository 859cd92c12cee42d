//! Narrowband FM demodulator.
//!
//! Phase-difference discriminator with boxcar decimation to the audio rate
//! and a continuously-updated frequency-deviation metric (peak and EMA),
//! reported roughly every half second of demod-rate samples.

/// Deviation EMA smoothing factor, in the pipeline-context configuration
/// (as opposed to the standalone discriminator's faster α = 0.01).
const DEV_EMA_ALPHA: f32 = 0.05;

/// A deviation report, emitted once per reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationReport {
    pub peak_khz: f32,
    pub ema_khz: f32,
}

pub struct FmDemodulator {
    last_phase: f32,
    audio_gain: f32,
    decimation: u32,
    demod_rate_hz: u32,
    sum_audio: f32,
    dec_counter: u32,
    dev_max_hz: f32,
    dev_ema_hz: f32,
    dev_counter: u32,
    dev_report_samples: u32,
}

impl FmDemodulator {
    /// `demod_rate_hz` is `F_demod`; `decimation` is `D_aud = F_demod/F_audio`.
    pub fn new(demod_rate_hz: u32, decimation: u32, audio_gain: f32) -> Self {
        // ~0.5s worth of demod-rate samples, per the pipeline's reporting cadence.
        let dev_report_samples = (demod_rate_hz as f32 * 0.5).round() as u32;
        Self {
            last_phase: 0.0,
            audio_gain,
            decimation,
            demod_rate_hz,
            sum_audio: 0.0,
            dec_counter: 0,
            dev_max_hz: 0.0,
            dev_ema_hz: 0.0,
            dev_counter: 0,
            dev_report_samples: dev_report_samples.max(1),
        }
    }

    /// Feeds one demod-rate IQ sample (already scaled to roughly unit
    /// magnitude). Returns the boxcar-averaged, gain-scaled, int16-clamped
    /// audio sample once every `decimation` inputs, and/or a deviation
    /// report once every `dev_report_samples` inputs.
    pub fn process_iq(&mut self, i: f32, q: f32) -> (Option<i16>, Option<DeviationReport>) {
        let current_phase = q.atan2(i);
        let mut d = current_phase - self.last_phase;
        if d > std::f32::consts::PI {
            d -= 2.0 * std::f32::consts::PI;
        }
        if d < -std::f32::consts::PI {
            d += 2.0 * std::f32::consts::PI;
        }
        self.last_phase = current_phase;

        self.sum_audio += d;
        self.dec_counter += 1;
        let audio = if self.dec_counter == self.decimation {
            let avg = self.sum_audio / self.decimation as f32;
            self.sum_audio = 0.0;
            self.dec_counter = 0;
            Some(float_to_i16(avg, self.audio_gain))
        } else {
            None
        };

        let fi_hz = (d * self.demod_rate_hz as f32 / (2.0 * std::f32::consts::PI)).abs();
        if fi_hz > self.dev_max_hz {
            self.dev_max_hz = fi_hz;
        }
        self.dev_ema_hz = (1.0 - DEV_EMA_ALPHA) * self.dev_ema_hz + DEV_EMA_ALPHA * fi_hz;
        self.dev_counter += 1;
        let report = if self.dev_counter >= self.dev_report_samples {
            let r = DeviationReport {
                peak_khz: self.dev_max_hz / 1e3,
                ema_khz: self.dev_ema_hz / 1e3,
            };
            self.dev_max_hz = 0.0;
            self.dev_counter = 0;
            Some(r)
        } else {
            None
        };

        (audio, report)
    }
}

fn float_to_i16(x: f32, gain: f32) -> i16 {
    (x * gain).clamp(-32768.0, 32767.0).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn tone_phase_difference_matches_expected_frequency() {
        let demod_rate = 192_000u32;
        let f0 = 10_000.0f32;
        let mut fm = FmDemodulator::new(demod_rate, 4, 1.0);
        let mut last_ema = 0.0f32;
        for k in 0..(demod_rate * 2) {
            let theta = 2.0 * PI * f0 * k as f32 / demod_rate as f32;
            let (i, q) = (theta.cos(), theta.sin());
            let (_audio, report) = fm.process_iq(i, q);
            if let Some(r) = report {
                last_ema = r.ema_khz;
            }
        }
        // f0 = 10 kHz -> EMA should converge near 10 kHz within 1%.
        assert!(
            (last_ema - 10.0).abs() < 0.2,
            "expected ~10 kHz, got {last_ema} kHz"
        );
    }

    #[test]
    fn boxcar_emits_once_per_decimation() {
        let mut fm = FmDemodulator::new(48_000, 4, 8000.0);
        let mut emitted = 0;
        for k in 0..400 {
            let theta = 2.0 * PI * 1000.0 * k as f32 / 48_000.0;
            let (audio, _) = fm.process_iq(theta.cos(), theta.sin());
            if audio.is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 100);
    }
}
