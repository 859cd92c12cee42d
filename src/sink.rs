//! External collaborator interfaces: the audio encoder and the network sink.
//!
//! Both are treated as opaque capabilities per the design's "out of scope"
//! boundary: real implementations (an Opus encoder, a TCP socket) live
//! outside this crate. A simple in-memory double of each is provided here
//! for tests and for exercising the orchestrator without real hardware.

use std::io::{self, Write as _};
use std::net::TcpStream;

/// Encodes PCM audio into a compressed byte payload, e.g. an Opus frame.
pub trait AudioEncoder: Send {
    /// Encodes `pcm` (mono, 16-bit) into a payload no larger than 1500
    /// bytes, matching the framing header's 16-bit payload-length field.
    fn encode(&mut self, pcm: &[i16]) -> io::Result<Vec<u8>>;
}

/// A byte-stream sink for framed audio records, e.g. a TCP socket.
pub trait AudioSink: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// A no-op encoder that passes PCM through as raw little-endian bytes.
/// Useful where the real codec is irrelevant to the behavior under test.
pub struct PassthroughEncoder;

impl AudioEncoder for PassthroughEncoder {
    fn encode(&mut self, pcm: &[i16]) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(pcm.len() * 2);
        for sample in pcm {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(out)
    }
}

/// An in-memory sink that records every write, and can be told to fail on
/// its next write to exercise the `SinkClosed` shutdown path.
#[derive(Default)]
pub struct MemorySink {
    pub records: Vec<Vec<u8>>,
    pub fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Causes the `n`th call to `write_all` (1-indexed) to fail.
    pub fn fail_after(n: usize) -> Self {
        Self {
            records: Vec::new(),
            fail_after: Some(n),
        }
    }
}

impl AudioSink for MemorySink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(n) = self.fail_after {
            if self.records.len() + 1 == n {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink stalled"));
            }
        }
        self.records.push(bytes.to_vec());
        Ok(())
    }
}

/// A TCP-backed sink: framed audio records go straight to a connected
/// downstream consumer's socket.
pub struct TcpAudioSink {
    stream: TcpStream,
}

impl TcpAudioSink {
    pub fn new(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        Self { stream }
    }
}

impl AudioSink for TcpAudioSink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)
    }
}
