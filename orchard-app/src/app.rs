use anyhow::{Context, Result};
use orchard_classify::{TrainError, train};
use orchard_core::{ChannelLayout, SessionMode};
use orchard_experiment::{ExperimentConfig, Session, SessionContext, SessionSummary};
use orchard_store::SubjectStore;
use orchard_stream::{
    SimulatedResolver, SimulationOptions, StreamIngestion, StreamResolver, TcpResolver,
};
use orchard_timing::{HighPrecisionTimer, TickPacer};
use std::net::SocketAddr;
use std::sync::Arc;

/// Where samples come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// LSL discovery on the local network.
    Discover,
    /// A known outlet address.
    Direct(SocketAddr),
    /// Synthetic stream with the given channel count.
    Simulated(usize),
}

pub struct App {
    config: ExperimentConfig,
    source: Source,
}

impl App {
    pub fn new(config: ExperimentConfig, source: Source) -> Result<Self> {
        config.validate().context("configuration rejected")?;
        Ok(Self { config, source })
    }

    pub fn run(self) -> Result<SessionSummary> {
        tracing::info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "orchard apple catcher"
        );
        let timer = HighPrecisionTimer::new();
        let context = self.context()?;
        let name = context.config().stream.name.clone();

        match self.source {
            Source::Discover => run_session(context, &TcpResolver::new(), &name, timer),
            Source::Direct(addr) => run_session(context, &TcpResolver::direct(addr), &name, timer),
            Source::Simulated(channels) => {
                let layout = ChannelLayout::from_channel_count(channels).with_context(|| {
                    format!("cannot simulate {channels} channels; use 4, 8, 32 or 64")
                })?;
                let resolver =
                    SimulatedResolver::new(&name, layout, timer.clone(), SimulationOptions::default());
                run_session(context, &resolver, &name, timer)
            }
        }
    }

    /// Builds the session context, training the classifier for test mode.
    /// Missing or unpaired training data drops back to training mode.
    fn context(&self) -> Result<SessionContext> {
        let mut config = self.config.clone();
        if config.mode == SessionMode::Test {
            let store = SubjectStore::new(&config.storage.data_root, config.subject);
            match train(&store) {
                Ok(trained) => {
                    return SessionContext::for_evaluation(Arc::new(config), trained)
                        .context("building the evaluation context");
                }
                Err(err @ (TrainError::NoTrainingData | TrainError::Mismatch { .. })) => {
                    tracing::warn!(
                        subject = config.subject,
                        %err,
                        "cannot train a classifier; running a training session instead"
                    );
                    config.mode = SessionMode::Training;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("training the classifier for subject {}", config.subject)
                    });
                }
            }
        }
        SessionContext::for_collection(Arc::new(config)).context("building the session context")
    }
}

fn run_session<R>(
    context: SessionContext,
    resolver: &R,
    name: &str,
    timer: HighPrecisionTimer,
) -> Result<SessionSummary>
where
    R: StreamResolver,
{
    let config = Arc::clone(context.config());
    let ingestion = StreamIngestion::open(resolver, name, config.stream.resolve_timeout())
        .with_context(|| format!("opening stream '{name}'"))?;
    let mut session = Session::new(context, ingestion, timer.clone(), rand::rng())
        .context("setting up the session")?;
    let mut pacer = TickPacer::new(timer, config.timing.fps);
    let summary = session.run(&mut pacer).context("session aborted")?;

    tracing::info!(
        trials = summary.trials,
        score = summary.score,
        failures = summary.failures,
        skipped = summary.skipped,
        "experiment completed"
    );
    if let Some(result) = &summary.result {
        tracing::info!(
            accuracy = result.accuracy,
            f1 = result.f1,
            "predictions {:?} against {:?}",
            result.predictions,
            result.y_test
        );
    }
    Ok(summary)
}
