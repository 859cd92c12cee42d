//! Signal-processing stages: decimation, demodulation, and spectral estimation.

pub mod am;
pub mod cic;
pub mod fm;
pub mod psd;
pub mod window;
