//! Headless runner for the apple-catcher experiment.
//!
//! ```bash
//! # training session for subject 3 against the first stream found on the LAN
//! orchard --subject 3
//!
//! # evaluation without hardware
//! orchard --subject 3 --mode test --simulate
//! ```

mod app;

use anyhow::Context;
use app::{App, Source};
use clap::Parser;
use orchard_core::SessionMode;
use orchard_experiment::ExperimentConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "orchard", version, about = "Closed-loop motor imagery apple catcher")]
struct Cli {
    /// Subject number; data lives under `<data-root>/sNN`
    #[arg(short, long)]
    subject: Option<u32>,

    /// training, define or test
    #[arg(short, long)]
    mode: Option<SessionMode>,

    /// Trials before the session ends
    #[arg(short = 'n', long)]
    trials: Option<usize>,

    /// Acquisition stream name
    #[arg(long)]
    stream: Option<String>,

    /// Root of the subject directories
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// JSON file overriding the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connect to this outlet instead of running discovery
    #[arg(long, conflicts_with = "simulate")]
    connect: Option<SocketAddr>,

    /// Run against a synthetic stream
    #[arg(long)]
    simulate: bool,

    /// Channel count of the synthetic stream
    #[arg(long, default_value_t = 8)]
    channels: usize,

    /// Used when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)?,
            None => ExperimentConfig::default(),
        };
        if let Some(subject) = self.subject {
            config.subject = subject;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(trials) = self.trials {
            config.trials = trials;
        }
        if let Some(stream) = &self.stream {
            config.stream.name = stream.clone();
        }
        if let Some(root) = &self.data_root {
            config.storage.data_root = root.clone();
        }
        Ok(config)
    }

    fn source(&self) -> Source {
        match (self.simulate, self.connect) {
            (true, _) => Source::Simulated(self.channels),
            (false, Some(addr)) => Source::Direct(addr),
            (false, None) => Source::Discover,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = cli.config()?;
    let app = App::new(config, cli.source())?;
    app.run()?;
    Ok(())
}
