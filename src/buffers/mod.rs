//! Ring buffers connecting the pipeline's producer/consumer stages.

pub mod multi_reader;
pub mod signaled;

pub use multi_reader::{MultiReaderRingBuffer, Reader};
pub use signaled::SignaledRingBuffer;
