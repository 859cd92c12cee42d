//! Session configuration: TOML bootstrap file plus CLI overrides, validated
//! against the pipeline's rate and range invariants before any buffer is
//! allocated.

use std::path::PathBuf;

use serde::Deserialize;

use crate::dsp::psd::ScaleUnit;
use crate::dsp::window::WindowType;
use crate::error::{PipelineError, Result};

/// Demodulation mode, chosen once at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DemodMode {
    Fm,
    Am,
}

/// On-disk configuration, deserialized directly from TOML. Field names
/// match the session configuration table.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub center_freq_hz: u64,
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    #[serde(default = "default_demod_rate_hz")]
    pub demod_rate_hz: u32,
    #[serde(default = "default_audio_rate_hz")]
    pub audio_rate_hz: u32,
    #[serde(default = "default_mode")]
    pub mode: DemodMode,
    #[serde(default = "default_audio_gain")]
    pub audio_gain: f32,
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u32,
    #[serde(default = "default_rbw_hz")]
    pub rbw_hz: f64,
    #[serde(default = "default_overlap")]
    pub overlap: f64,
    #[serde(default = "default_window")]
    pub window: String,
    #[serde(default = "default_scale")]
    pub scale: String,
    #[serde(default = "default_span_hz")]
    pub span_hz: f64,
    #[serde(default)]
    pub lna_gain: u32,
    #[serde(default)]
    pub vga_gain: u32,
    #[serde(default)]
    pub amp_enabled: bool,
    #[serde(default)]
    pub ppm_error: f64,
    #[serde(default = "default_psd_csv_path")]
    pub psd_csv_path: PathBuf,
}

fn default_sample_rate_hz() -> u32 {
    19_200_000
}
fn default_demod_rate_hz() -> u32 {
    1_920_000
}
fn default_audio_rate_hz() -> u32 {
    48_000
}
fn default_mode() -> DemodMode {
    DemodMode::Fm
}
fn default_audio_gain() -> f32 {
    8000.0
}
fn default_frame_ms() -> u32 {
    20
}
fn default_rbw_hz() -> f64 {
    1000.0
}
fn default_overlap() -> f64 {
    0.5
}
fn default_window() -> String {
    "hamming".to_string()
}
fn default_scale() -> String {
    "dBm".to_string()
}
fn default_span_hz() -> f64 {
    1_000_000.0
}
fn default_psd_csv_path() -> PathBuf {
    PathBuf::from("psd.csv")
}

/// CLI overrides applied on top of the TOML file; `None` leaves the TOML
/// value untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub center_freq_hz: Option<u64>,
    pub mode: Option<DemodMode>,
    pub lna_gain: Option<u32>,
    pub vga_gain: Option<u32>,
    pub amp_enabled: Option<bool>,
}

/// Validated, runtime-ready configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub center_freq_hz: u64,
    pub sample_rate_hz: u32,
    pub demod_rate_hz: u32,
    pub audio_rate_hz: u32,
    pub mode: DemodMode,
    pub audio_gain: f32,
    pub frame_ms: u32,
    pub rbw_hz: f64,
    pub overlap: f64,
    pub window: WindowType,
    pub scale: ScaleUnit,
    pub span_hz: f64,
    pub lna_gain: u32,
    pub vga_gain: u32,
    pub amp_enabled: bool,
    pub ppm_error: f64,
    pub psd_csv_path: PathBuf,
}

impl PipelineConfig {
    pub fn decim_factor(&self) -> u32 {
        self.sample_rate_hz / self.demod_rate_hz
    }

    pub fn audio_decimation(&self) -> u32 {
        self.demod_rate_hz / self.audio_rate_hz
    }

    /// Reads and parses a TOML file, applies `overrides`, and validates
    /// every rate/range invariant, collecting *all* violations into one
    /// error rather than failing on the first.
    pub fn load(toml_path: &std::path::Path, overrides: ConfigOverrides) -> Result<Self> {
        let toml_str = std::fs::read_to_string(toml_path)
            .map_err(|e| PipelineError::ConfigInvalid(format!("cannot read {toml_path:?}: {e}")))?;
        let raw: TomlConfig = toml::from_str(&toml_str)
            .map_err(|e| PipelineError::ConfigInvalid(format!("cannot parse TOML: {e}")))?;
        Self::from_toml(raw, overrides)
    }

    pub fn from_toml(raw: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let mut violations = Vec::new();

        let center_freq_hz = overrides.center_freq_hz.unwrap_or(raw.center_freq_hz);
        let mode = overrides.mode.unwrap_or(raw.mode);
        let lna_gain = overrides.lna_gain.unwrap_or(raw.lna_gain);
        let vga_gain = overrides.vga_gain.unwrap_or(raw.vga_gain);
        let amp_enabled = overrides.amp_enabled.unwrap_or(raw.amp_enabled);

        if raw.sample_rate_hz == 0 || raw.demod_rate_hz == 0 {
            violations.push("sample_rate_hz and demod_rate_hz must be nonzero".to_string());
        } else if raw.sample_rate_hz % raw.demod_rate_hz != 0 {
            violations.push(format!(
                "sample_rate_hz ({}) must be a multiple of demod_rate_hz ({})",
                raw.sample_rate_hz, raw.demod_rate_hz
            ));
        } else if raw.sample_rate_hz / raw.demod_rate_hz < 2 {
            violations.push("sample_rate_hz / demod_rate_hz (R) must be >= 2".to_string());
        }

        if raw.demod_rate_hz == 0 || raw.audio_rate_hz == 0 {
            violations.push("demod_rate_hz and audio_rate_hz must be nonzero".to_string());
        } else if raw.demod_rate_hz % raw.audio_rate_hz != 0 {
            violations.push(format!(
                "demod_rate_hz ({}) must be a multiple of audio_rate_hz ({})",
                raw.demod_rate_hz, raw.audio_rate_hz
            ));
        }

        if (raw.frame_ms as u64 * raw.audio_rate_hz as u64) % 1000 != 0 {
            violations.push(format!(
                "frame_ms ({}) * audio_rate_hz ({}) / 1000 must be an integer",
                raw.frame_ms, raw.audio_rate_hz
            ));
        }

        if !(0.0..1.0).contains(&raw.overlap) {
            violations.push(format!("overlap ({}) must be in [0, 1)", raw.overlap));
        }

        let window = WindowType::parse(&raw.window);
        if window.is_none() {
            violations.push(format!("unrecognized window {:?}", raw.window));
        }

        let scale = ScaleUnit::parse(&raw.scale);
        if scale.is_none() {
            violations.push(format!("unrecognized scale {:?}", raw.scale));
        }

        if !violations.is_empty() {
            return Err(PipelineError::ConfigInvalid(violations.join("; ")));
        }

        Ok(PipelineConfig {
            center_freq_hz,
            sample_rate_hz: raw.sample_rate_hz,
            demod_rate_hz: raw.demod_rate_hz,
            audio_rate_hz: raw.audio_rate_hz,
            mode,
            audio_gain: raw.audio_gain,
            frame_ms: raw.frame_ms,
            rbw_hz: raw.rbw_hz,
            overlap: raw.overlap,
            window: window.unwrap(),
            scale: scale.unwrap(),
            span_hz: raw.span_hz,
            lna_gain,
            vga_gain,
            amp_enabled,
            ppm_error: raw.ppm_error,
            psd_csv_path: raw.psd_csv_path,
        })
    }
}
