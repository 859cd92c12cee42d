//! End-to-end integration tests exercising the full pipeline wiring: device
//! callback -> decimator -> demodulator -> packetizer -> sink, and the
//! parallel raw-IQ -> PSD -> CSV branch, via the in-memory test doubles
//! (`SyntheticRfFrontEnd`, `PassthroughEncoder`, and the `SharedSink` below).
//!
//! These drive real OS threads in real time, so each test budgets a few
//! wall-clock seconds; that is inherent to testing a real-time pipeline
//! end-to-end rather than a mock of it.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sdr_pipeline::config::{ConfigOverrides, DemodMode, PipelineConfig, TomlConfig};
use sdr_pipeline::orchestrator::Pipeline;
use sdr_pipeline::rf::SyntheticRfFrontEnd;
use sdr_pipeline::sink::{AudioSink, PassthroughEncoder};

/// An `AudioSink` that records every write behind a mutex and can be told to
/// fail after a configured number of writes, so a test thread can inspect
/// progress and trigger the `SinkClosed` shutdown path while the network
/// thread is still live.
#[derive(Clone, Default)]
struct SharedSink {
    records: Arc<Mutex<Vec<Vec<u8>>>>,
    writes: Arc<AtomicUsize>,
    fail_after: Option<usize>,
}

impl SharedSink {
    fn new() -> Self {
        Self::default()
    }

    /// Succeeds on the first `n` writes, fails on the `(n+1)`th and every
    /// write after.
    fn fail_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl AudioSink for SharedSink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let n = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(limit) = self.fail_after {
            if n > limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink stalled"));
            }
        }
        self.records.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }
}

fn scenario_config(mode: DemodMode, psd_csv_path: std::path::PathBuf) -> PipelineConfig {
    let raw = TomlConfig {
        center_freq_hz: 100_000_000,
        sample_rate_hz: 1_920_000,
        demod_rate_hz: 192_000,
        audio_rate_hz: 48_000,
        mode,
        audio_gain: 8000.0,
        frame_ms: 20,
        rbw_hz: 1000.0,
        overlap: 0.5,
        window: "hann".to_string(),
        scale: "dBm".to_string(),
        span_hz: 1_000_000.0,
        lna_gain: 16,
        vga_gain: 20,
        amp_enabled: false,
        ppm_error: 0.0,
        psd_csv_path,
    };
    PipelineConfig::from_toml(raw, ConfigOverrides::default()).expect("scenario config is valid")
}

/// Scenario 1 / 6: tone passthrough + rate sanity. At `F_in = 1.92 MHz`,
/// `F_demod = 192 kHz` (R=10), `F_audio = 48 kHz` (D_aud=4), `frame_ms = 20`,
/// the packetizer should emit records at 50 Hz, so ~2.2s of runtime yields
/// comfortably more than the scenario's 90-record floor.
#[test]
fn fm_tone_passthrough_emits_audio_at_configured_frame_rate() {
    let dir = tempfile::tempdir().unwrap();
    let config = scenario_config(DemodMode::Fm, dir.path().join("psd.csv"));
    let rf = Box::new(SyntheticRfFrontEnd::new(DemodMode::Fm));
    let encoder = Box::new(PassthroughEncoder);
    let sink = SharedSink::new();
    let observed = sink.clone();

    let pipeline = Pipeline::start(config, rf, encoder, Box::new(sink)).expect("pipeline starts");
    std::thread::sleep(Duration::from_millis(2_200));
    let snapshot = pipeline.stop_and_join();

    // Each frame is a header write followed by a payload write.
    let frames = observed.record_count() / 2;
    assert!(
        frames >= 90,
        "expected >=90 audio frames in ~2.2s at 50Hz, got {frames} (drops: {snapshot})"
    );
}

/// Scenario 1 continued: AM mode wiring produces audio at the same
/// configured frame rate (depth-EMA convergence itself is covered at the
/// component level in `dsp::am`, where the envelope's full math is exposed).
#[test]
fn am_envelope_passthrough_emits_audio_at_configured_frame_rate() {
    let dir = tempfile::tempdir().unwrap();
    let config = scenario_config(DemodMode::Am, dir.path().join("psd.csv"));
    let rf = Box::new(SyntheticRfFrontEnd::new(DemodMode::Am));
    let encoder = Box::new(PassthroughEncoder);
    let sink = SharedSink::new();
    let observed = sink.clone();

    let pipeline = Pipeline::start(config, rf, encoder, Box::new(sink)).expect("pipeline starts");
    std::thread::sleep(Duration::from_millis(2_200));
    let snapshot = pipeline.stop_and_join();

    let frames = observed.record_count() / 2;
    assert!(
        frames >= 90,
        "expected >=90 audio frames in ~2.2s at 50Hz, got {frames} (drops: {snapshot})"
    );
}

/// Scenario 3: backpressure. Stalling the sink must assert stop and join
/// every worker thread within a bounded time, with no crash or hang.
#[test]
fn sink_failure_triggers_bounded_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let config = scenario_config(DemodMode::Fm, dir.path().join("psd.csv"));
    let rf = Box::new(SyntheticRfFrontEnd::new(DemodMode::Fm));
    let encoder = Box::new(PassthroughEncoder);
    // 50 records = 50 frames = 100 individual write_all calls (header + payload each).
    let sink = SharedSink::fail_after(100);

    let pipeline = Pipeline::start(config, rf, encoder, Box::new(sink)).expect("pipeline starts");

    let deadline = Instant::now() + Duration::from_secs(5);
    while !pipeline.is_stopped() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(
        pipeline.is_stopped(),
        "pipeline should self-stop once the sink starts failing"
    );

    let join_start = Instant::now();
    let snapshot = pipeline.stop_and_join();
    assert!(
        join_start.elapsed() < Duration::from_secs(2),
        "worker threads should join promptly once stop is asserted"
    );
    let _ = snapshot; // drop counters may be non-zero; that is expected, not a failure
}

/// Scenario 4: PSD scale. End-to-end, a full Welch cycle over the live raw-IQ
/// branch should produce a CSV with the configured unit's header within one
/// capture-plus-post-sleep cycle. The spectral-shape property itself (flat
/// for white noise, Parseval bound) is exercised directly against
/// `execute_welch_psd` in `dsp::psd`, where a synthetic noise source is cheap
/// to construct; here we only verify the pipeline actually drives that path.
#[test]
fn psd_cycle_writes_csv_with_expected_header() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("psd.csv");
    let config = scenario_config(DemodMode::Fm, csv_path.clone());
    let rf = Box::new(SyntheticRfFrontEnd::new(DemodMode::Fm));
    let encoder = Box::new(PassthroughEncoder);
    let sink = SharedSink::new();

    let pipeline = Pipeline::start(config, rf, encoder, Box::new(sink)).expect("pipeline starts");

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut contents = String::new();
    while Instant::now() < deadline {
        if let Ok(s) = std::fs::read_to_string(&csv_path) {
            if s.starts_with("freq_hz,psd_dBm\n") && s.lines().count() > 1 {
                contents = s;
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    pipeline.stop_and_join();

    assert!(
        contents.starts_with("freq_hz,psd_dBm\n"),
        "expected a dBm header within 5s, got: {contents:?}"
    );
    assert!(contents.lines().count() > 1, "expected at least one data row");
}

/// Shutdown liveness: after a clean `stop_and_join` every worker thread must
/// have joined (the call itself would hang otherwise) and is safe to call
/// exactly once even when nothing ever failed.
#[test]
fn clean_shutdown_joins_all_threads_without_sink_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = scenario_config(DemodMode::Fm, dir.path().join("psd.csv"));
    let rf = Box::new(SyntheticRfFrontEnd::new(DemodMode::Fm));
    let encoder = Box::new(PassthroughEncoder);
    let sink = SharedSink::new();

    let pipeline = Pipeline::start(config, rf, encoder, Box::new(sink)).expect("pipeline starts");
    std::thread::sleep(Duration::from_millis(300));

    let join_start = Instant::now();
    pipeline.stop_and_join();
    assert!(join_start.elapsed() < Duration::from_secs(2));
}
