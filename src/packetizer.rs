//! Audio packetizer (C7).
//!
//! Groups PCM samples into fixed-duration frames, encodes each frame, and
//! writes a 16-byte big-endian header followed by the compressed payload to
//! the sink. If the sink write fails mid-record the caller's session must
//! terminate; there is no partial-frame recovery.

use crate::error::{PipelineError, Result};
use crate::sink::{AudioEncoder, AudioSink};

pub const MAGIC: u32 = 0x4F50_5530; // "OPU0"
pub const HEADER_LEN: usize = 16;

/// Groups PCM into `frame_samples`-sample frames and ships each as one
/// framed record. Maintains the strictly-increasing sequence number.
pub struct Packetizer {
    frame_samples: usize,
    sample_rate_hz: u32,
    channels: u16,
    seq: u32,
}

impl Packetizer {
    /// `frame_ms` is the packet duration; `sample_rate_hz` is `F_audio`.
    pub fn new(sample_rate_hz: u32, frame_ms: u32, channels: u16) -> Self {
        let frame_samples = (sample_rate_hz as u64 * frame_ms as u64 / 1000) as usize;
        Self {
            frame_samples,
            sample_rate_hz,
            channels,
            seq: 0,
        }
    }

    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Encodes exactly one frame of PCM and writes the framed record.
    /// `pcm.len()` must equal `frame_samples()`.
    pub fn send_frame(
        &mut self,
        pcm: &[i16],
        encoder: &mut dyn AudioEncoder,
        sink: &mut dyn AudioSink,
    ) -> Result<()> {
        debug_assert_eq!(pcm.len(), self.frame_samples);

        let payload = encoder
            .encode(pcm)
            .map_err(|e| PipelineError::SinkClosed(format!("encode failed: {e}")))?;
        debug_assert!(payload.len() <= u16::MAX as usize);

        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&MAGIC.to_be_bytes());
        header[4..8].copy_from_slice(&self.seq.to_be_bytes());
        header[8..12].copy_from_slice(&self.sample_rate_hz.to_be_bytes());
        header[12..14].copy_from_slice(&self.channels.to_be_bytes());
        header[14..16].copy_from_slice(&(payload.len() as u16).to_be_bytes());

        sink.write_all(&header)
            .map_err(|e| PipelineError::SinkClosed(format!("header write failed: {e}")))?;
        sink.write_all(&payload)
            .map_err(|e| PipelineError::SinkClosed(format!("payload write failed: {e}")))?;

        self.seq = self.seq.wrapping_add(1);
        Ok(())
    }
}
