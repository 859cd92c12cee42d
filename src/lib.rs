//! # SDR streaming pipeline library
//!
//! Real-time decimation, demodulation, spectrum estimation, and audio
//! packetization for a continuously-sampled IQ stream, driven by a
//! callback-based RF front-end.

pub mod buffers;
pub mod config;
pub mod dsp;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod packetizer;
pub mod rf;
pub mod sink;

pub use error::{PipelineError, Result};
