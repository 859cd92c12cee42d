//! # SDR streaming pipeline
//!
//! Ingests IQ samples from an RF front-end, demodulates (FM or AM),
//! packetizes PCM audio to a TCP consumer, and writes a Welch PSD spectrum
//! to CSV on a parallel cadence.

use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sdr_pipeline::config::{ConfigOverrides, DemodMode, PipelineConfig};
use sdr_pipeline::error::RecoveryStrategy;
use sdr_pipeline::orchestrator::Pipeline;
use sdr_pipeline::rf::SyntheticRfFrontEnd;
use sdr_pipeline::sink::{PassthroughEncoder, TcpAudioSink};

#[derive(Parser, Debug)]
#[command(name = "sdr-pipeline")]
#[command(about = "Real-time SDR demodulation and streaming pipeline")]
#[command(version)]
struct Args {
    /// Path to the TOML session configuration file.
    #[arg(short, long, default_value = "sdr-pipeline.toml")]
    config: PathBuf,

    /// Overrides the configured center frequency, in Hz.
    #[arg(long)]
    center_freq: Option<u64>,

    /// Overrides the configured demodulation mode.
    #[arg(long, value_enum)]
    mode: Option<CliMode>,

    /// Address of the downstream audio consumer to connect to.
    #[arg(long, default_value = "127.0.0.1:9000")]
    sink_addr: String,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliMode {
    Fm,
    Am,
}

impl From<CliMode> for DemodMode {
    fn from(m: CliMode) -> Self {
        match m {
            CliMode::Fm => DemodMode::Fm,
            CliMode::Am => DemodMode::Am,
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sdr_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
        .init();

    let args = Args::parse();
    info!(
        git_hash = env!("GIT_HASH"),
        build_timestamp = env!("BUILD_TIMESTAMP"),
        build_profile = env!("BUILD_PROFILE"),
        config = ?args.config,
        "starting sdr-pipeline"
    );

    let overrides = ConfigOverrides {
        center_freq_hz: args.center_freq,
        mode: args.mode.map(DemodMode::from),
        ..Default::default()
    };

    let config = match PipelineConfig::load(&args.config, overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error_code = e.error_code(), error = %e, "configuration invalid");
            std::process::exit(1);
        }
    };
    info!(
        center_freq_hz = config.center_freq_hz,
        mode = ?config.mode,
        sample_rate_hz = config.sample_rate_hz,
        "configuration loaded"
    );

    let rf = Box::new(SyntheticRfFrontEnd::new(config.mode));

    let encoder = Box::new(PassthroughEncoder);

    let sink = match TcpStream::connect(args.sink_addr.as_str()) {
        Ok(stream) => Box::new(TcpAudioSink::new(stream)),
        Err(e) => {
            error!(sink_addr = %args.sink_addr, error = %e, "failed to connect to audio sink");
            std::process::exit(2);
        }
    };

    let pipeline = match Pipeline::start(config, rf, encoder, sink) {
        Ok(p) => p,
        Err(e) => {
            error!(error_code = e.error_code(), error = %e, "failed to start pipeline");
            std::process::exit(match e.recovery_strategy() {
                RecoveryStrategy::Fatal => 3,
                _ => 1,
            });
        }
    };

    while !pipeline.is_stopped() {
        std::thread::sleep(Duration::from_millis(200));
    }

    let snapshot = pipeline.stop_and_join();
    info!(%snapshot, "sdr-pipeline shut down");
}
