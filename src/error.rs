//! Error types for the SDR streaming pipeline.
//!
//! Mirrors the five error kinds of the design: invalid configuration,
//! an unavailable RF front-end, a closed downstream sink, buffer overflow
//! (counted, not fatal), and PSD-cycle timeout (skipped, not fatal).

use thiserror::Error;

/// Top-level error type for the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Session configuration violates a rate-divisibility or range invariant.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The RF front-end could not be opened or configured.
    #[error("RF front-end unavailable: {0}")]
    DeviceUnavailable(String),

    /// The encoder or network sink failed; the session must terminate.
    #[error("downstream sink closed: {0}")]
    SinkClosed(String),

    /// Generic I/O error, e.g. while writing the PSD CSV file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// How the orchestrator should react to a given error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Log and terminate the process.
    Fatal,
    /// Assert `stop`, drain in-flight work, and exit cleanly.
    DrainAndExit,
    /// Skip the current cycle and retry on the next iteration.
    SkipCycle,
}

impl PipelineError {
    /// Short, stable code for log correlation, e.g. `"SDR_CFG_001"`.
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::ConfigInvalid(_) => "SDR_CFG_001",
            PipelineError::DeviceUnavailable(_) => "SDR_DEV_001",
            PipelineError::SinkClosed(_) => "SDR_NET_001",
            PipelineError::Io(_) => "SDR_IO_001",
        }
    }

    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            PipelineError::ConfigInvalid(_) => RecoveryStrategy::Fatal,
            PipelineError::DeviceUnavailable(_) => RecoveryStrategy::Fatal,
            PipelineError::SinkClosed(_) => RecoveryStrategy::DrainAndExit,
            PipelineError::Io(_) => RecoveryStrategy::Fatal,
        }
    }
}

/// A PSD cycle that did not accumulate enough samples before its deadline.
/// Not part of [`PipelineError`]: the PSD thread catches this itself, resets
/// its capture buffer, and re-arms; it never propagates to the orchestrator.
#[derive(Debug, Error)]
#[error("PSD capture timed out after {iterations} poll iterations")]
pub struct PsdTimeout {
    pub iterations: u32,
}
