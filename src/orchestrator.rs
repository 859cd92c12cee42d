//! Pipeline orchestrator (C8): wires buffers and worker threads, owns their
//! lifecycles, and coordinates shutdown.
//!
//! Thread roles: decimator, demodulator, network (packetizer), PSD. The
//! device callback itself is driven by the RF front-end's own thread and
//! only ever touches the raw-IQ buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::buffers::{MultiReaderRingBuffer, Reader, SignaledRingBuffer};
use crate::config::{DemodMode, PipelineConfig};
use crate::dsp::am::AmDemodulator;
use crate::dsp::cic::CicDecimator;
use crate::dsp::fm::FmDemodulator;
use crate::dsp::psd::{execute_welch_psd, scale_and_crop, write_csv, PsdConfig};
use crate::error::{PipelineError, Result};
use crate::metrics::{DropCounters, DropSnapshot};
use crate::packetizer::Packetizer;
use crate::rf::{iq_bytes_as_u8, FrontEndGains, RfFrontEnd};
use crate::sink::{AudioEncoder, AudioSink};

/// Poll iteration cap before a PSD cycle is treated as a timeout.
const PSD_WAIT_TIMEOUT_ITERS: u32 = 500;
/// Sleep between polls while waiting for a PSD capture to fill.
const PSD_WAIT_SLEEP: Duration = Duration::from_millis(10);
/// Sleep after each PSD cycle (successful or not) before re-arming.
const PSD_POST_SLEEP: Duration = Duration::from_millis(500);

struct Buffers {
    raw_iq: MultiReaderRingBuffer,
    demod_iq: SignaledRingBuffer,
    pcm: SignaledRingBuffer,
}

/// A running pipeline: four worker threads plus ownership of the device.
pub struct Pipeline {
    stop: Arc<AtomicBool>,
    buffers: Arc<Buffers>,
    counters: Arc<DropCounters>,
    threads: Vec<JoinHandle<()>>,
    rf: Box<dyn RfFrontEnd>,
}

impl Pipeline {
    /// Constructs buffers, opens the device, and starts the four worker
    /// threads in order decim -> demod -> net -> psd. Any failure asserts
    /// stop, wakes all buffers, and joins threads already created before
    /// returning the error.
    pub fn start(
        config: PipelineConfig,
        mut rf: Box<dyn RfFrontEnd>,
        encoder: Box<dyn AudioEncoder>,
        sink: Box<dyn AudioSink>,
    ) -> Result<Self> {
        rf.open()
            .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?;
        rf.set_sample_rate(config.sample_rate_hz)
            .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?;
        rf.set_center_freq(config.center_freq_hz, config.ppm_error)
            .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?;
        rf.set_gains(FrontEndGains {
            lna_gain: config.lna_gain,
            vga_gain: config.vga_gain,
            amp_enabled: config.amp_enabled,
        })
        .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?;

        let raw_iq_capacity = config.sample_rate_hz as usize * 2; // ~1s of raw IQ bytes
        let demod_iq_capacity = (config.demod_rate_hz as usize * 2 / 4).max(256);
        let pcm_capacity = config.audio_rate_hz as usize * 2 * 2; // ~2s of i16 audio

        let buffers = Arc::new(Buffers {
            raw_iq: MultiReaderRingBuffer::new(raw_iq_capacity),
            demod_iq: SignaledRingBuffer::new(demod_iq_capacity),
            pcm: SignaledRingBuffer::new(pcm_capacity),
        });
        let stop = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(DropCounters::new());

        let mut threads = Vec::new();

        macro_rules! spawn_or_rollback {
            ($body:expr) => {
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
                    Ok(handle) => threads.push(handle),
                    Err(_) => {
                        stop.store(true, Ordering::Release);
                        buffers.raw_iq.wake_all();
                        buffers.demod_iq.stop();
                        buffers.demod_iq.wake_all();
                        buffers.pcm.stop();
                        buffers.pcm.wake_all();
                        for t in threads.drain(..) {
                            let _ = t.join();
                        }
                        return Err(PipelineError::DeviceUnavailable(
                            "failed to start a pipeline worker thread".into(),
                        ));
                    }
                }
            };
        }

        spawn_or_rollback!(spawn_decim_thread(
            Arc::clone(&buffers),
            Arc::clone(&stop),
            Arc::clone(&counters),
            config.decim_factor(),
        ));
        spawn_or_rollback!(spawn_demod_thread(
            Arc::clone(&buffers),
            Arc::clone(&counters),
            config.clone(),
        ));
        spawn_or_rollback!(spawn_net_thread(
            Arc::clone(&buffers),
            Arc::clone(&stop),
            config.clone(),
            encoder,
            sink,
        ));
        spawn_or_rollback!(spawn_psd_thread(
            Arc::clone(&buffers),
            Arc::clone(&stop),
            config.clone(),
        ));

        let raw_iq_for_callback = Arc::clone(&buffers);
        if let Err(e) = rf.start_rx(Box::new(move |iq_bytes: &[i8]| {
            raw_iq_for_callback.raw_iq.write(iq_bytes_as_u8(iq_bytes));
        })) {
            stop.store(true, Ordering::Release);
            buffers.raw_iq.wake_all();
            buffers.demod_iq.stop();
            buffers.demod_iq.wake_all();
            buffers.pcm.stop();
            buffers.pcm.wake_all();
            for t in threads {
                let _ = t.join();
            }
            return Err(PipelineError::DeviceUnavailable(e.to_string()));
        }

        info!(
            center_freq_hz = config.center_freq_hz,
            mode = ?config.mode,
            "pipeline started"
        );

        Ok(Pipeline {
            stop,
            buffers,
            counters,
            threads,
            rf,
        })
    }

    /// Asserts the stop flag, wakes every blocked reader, stops the
    /// device, and joins all worker threads, returning the final drop
    /// counter summary.
    pub fn stop_and_join(mut self) -> DropSnapshot {
        self.stop.store(true, Ordering::Release);
        self.buffers.raw_iq.wake_all();
        self.buffers.demod_iq.stop();
        self.buffers.demod_iq.wake_all();
        self.buffers.pcm.stop();
        self.buffers.pcm.wake_all();

        let _ = self.rf.stop_rx();
        let _ = self.rf.close();

        for t in self.threads.drain(..) {
            let _ = t.join();
        }

        let snapshot = DropSnapshot {
            raw_iq: self.buffers.raw_iq.drops(Reader::Demod),
            demod_iq: self.counters.demod_iq(),
            pcm: self.counters.pcm(),
            psd: self.buffers.raw_iq.drops(Reader::Psd),
        };
        info!(%snapshot, "pipeline stopped");
        snapshot
    }

    /// True once a fatal condition (e.g. a closed sink) has asserted stop
    /// on its own, without an explicit call to `stop_and_join`.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

fn spawn_decim_thread(
    buffers: Arc<Buffers>,
    stop: Arc<AtomicBool>,
    counters: Arc<DropCounters>,
    decim_factor: u32,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("decim".into())
        .spawn(move || {
            let mut cic = CicDecimator::new(decim_factor, crate::dsp::cic::DEFAULT_STAGES);
            let mut in_buf = [0u8; 2];
            loop {
                let n = buffers.raw_iq.read_blocking(Reader::Demod, &mut in_buf, &|| {
                    stop.load(Ordering::Acquire)
                });
                if n == 0 {
                    break;
                }
                let xi = in_buf[0] as i8 as i32;
                let xq = in_buf[1] as i8 as i32;
                if let Some((yi, yq)) = cic.process_one(xi, xq) {
                    let out = [yi as u8, yq as u8];
                    let written = buffers.demod_iq.write(&out);
                    if written < out.len() {
                        counters.add_demod_iq((out.len() - written) as u64);
                    }
                }
            }
            debug!("decim thread exiting");
        })
        .expect("failed to spawn decim thread")
}

/// Reads one demod-rate IQ sample off `buffers.demod_iq`, scaled to roughly
/// unit magnitude. Returns `None` once the buffer reports shutdown.
fn read_demod_sample(buffers: &Buffers) -> Option<(f32, f32)> {
    let mut in_buf = [0u8; 2];
    let n = buffers.demod_iq.read_blocking(&mut in_buf);
    if n == 0 {
        return None;
    }
    let i = (in_buf[0] as i8) as f32 / 128.0;
    let q = (in_buf[1] as i8) as f32 / 128.0;
    Some((i, q))
}

/// Writes one PCM sample to `buffers.pcm`, counting any drop.
fn emit_pcm_sample(buffers: &Buffers, counters: &DropCounters, sample: i16) {
    let bytes = sample.to_le_bytes();
    let written = buffers.pcm.write(&bytes);
    if written < bytes.len() {
        counters.add_pcm((bytes.len() - written) as u64);
    }
}

fn spawn_demod_thread(
    buffers: Arc<Buffers>,
    counters: Arc<DropCounters>,
    config: PipelineConfig,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("demod".into())
        .spawn(move || {
            // The session's mode is chosen once here, not re-examined per
            // sample: each arm builds only the demodulator it needs and runs
            // its own loop for the rest of the session's lifetime.
            let decimation = config.audio_decimation();
            match config.mode {
                DemodMode::Fm => {
                    let mut fm =
                        FmDemodulator::new(config.demod_rate_hz, decimation, config.audio_gain);
                    while let Some((i, q)) = read_demod_sample(&buffers) {
                        let (audio, report) = fm.process_iq(i, q);
                        if let Some(r) = report {
                            info!(peak_khz = r.peak_khz, ema_khz = r.ema_khz, "FM deviation report");
                        }
                        if let Some(sample) = audio {
                            emit_pcm_sample(&buffers, &counters, sample);
                        }
                    }
                }
                DemodMode::Am => {
                    let mut am = AmDemodulator::new(decimation, config.audio_gain);
                    while let Some((i, q)) = read_demod_sample(&buffers) {
                        let (audio, report) = am.process_iq(i, q);
                        if let Some(r) = report {
                            info!(
                                depth_peak_pct = r.depth_peak_pct,
                                depth_ema_pct = r.depth_ema_pct,
                                "AM depth report"
                            );
                        }
                        if let Some(sample) = audio {
                            emit_pcm_sample(&buffers, &counters, sample);
                        }
                    }
                }
            }
            debug!("demod thread exiting");
        })
        .expect("failed to spawn demod thread")
}

fn spawn_net_thread(
    buffers: Arc<Buffers>,
    stop: Arc<AtomicBool>,
    config: PipelineConfig,
    encoder: Box<dyn AudioEncoder>,
    sink: Box<dyn AudioSink>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("net".into())
        .spawn(move || {
            let mut packetizer = Packetizer::new(config.audio_rate_hz, config.frame_ms, 1);
            let frame_samples = packetizer.frame_samples();
            let mut byte_buf = vec![0u8; frame_samples * 2];
            let mut encoder = encoder;
            let mut sink = sink;
            loop {
                let n = buffers.pcm.read_blocking(&mut byte_buf);
                if n == 0 {
                    break;
                }
                let pcm: Vec<i16> = byte_buf
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]))
                    .collect();
                if let Err(e) = packetizer.send_frame(&pcm, encoder.as_mut(), sink.as_mut()) {
                    warn!(error = %e, "network sink failed, terminating session");
                    stop.store(true, Ordering::Release);
                    buffers.raw_iq.wake_all();
                    buffers.demod_iq.stop();
                    buffers.demod_iq.wake_all();
                    buffers.pcm.stop();
                    buffers.pcm.wake_all();
                    break;
                }
            }
            debug!("net thread exiting");
        })
        .expect("failed to spawn net thread")
}

fn spawn_psd_thread(
    buffers: Arc<Buffers>,
    stop: Arc<AtomicBool>,
    config: PipelineConfig,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("psd".into())
        .spawn(move || {
            let total_bytes = config.sample_rate_hz as usize * 2;
            let psd_cfg = PsdConfig::new(
                config.window,
                config.sample_rate_hz as f64,
                config.rbw_hz,
                config.overlap,
                config.scale,
                config.span_hz,
                config.center_freq_hz as f64,
            );
            let csv_path = config.psd_csv_path.clone();

            while !stop.load(Ordering::Acquire) {
                let mut iterations = 0u32;
                let mut timed_out = false;
                loop {
                    if stop.load(Ordering::Acquire) {
                        return;
                    }
                    if buffers.raw_iq.available(Reader::Psd) >= total_bytes as u64 {
                        break;
                    }
                    iterations += 1;
                    if iterations >= PSD_WAIT_TIMEOUT_ITERS {
                        timed_out = true;
                        break;
                    }
                    thread::sleep(PSD_WAIT_SLEEP);
                }

                if timed_out {
                    warn!(iterations, "PSD capture timed out, skipping cycle");
                    thread::sleep(PSD_POST_SLEEP);
                    continue;
                }

                let mut raw = vec![0u8; total_bytes];
                buffers.raw_iq.read(Reader::Psd, &mut raw);
                let raw_iq: Vec<i8> = raw.into_iter().map(|b| b as i8).collect();
                let signal = crate::dsp::psd::load_iq_from_bytes(&raw_iq);

                let linear_bins = execute_welch_psd(&signal, &psd_cfg);
                let scaled = scale_and_crop(&linear_bins, &psd_cfg);

                match std::fs::File::create(&csv_path) {
                    Ok(file) => {
                        if let Err(e) = write_csv(&file, &scaled, psd_cfg.scale) {
                            warn!(error = %e, "failed to write PSD CSV");
                        } else {
                            let _ = file.sync_all();
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to open PSD CSV for writing"),
                }

                thread::sleep(PSD_POST_SLEEP);
            }
            debug!("psd thread exiting");
        })
        .expect("failed to spawn psd thread")
}
