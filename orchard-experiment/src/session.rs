use crate::config::ExperimentConfig;
use crate::context::SessionContext;
use crate::error::SessionError;
use crate::metrics;
use crate::playfield::{Playfield, Target};
use crate::sequence::{Slot, TargetSequence};
use crate::timer::{DecisionDue, TrialPhase, TrialTimer};
use orchard_classify::DecisionInput;
use orchard_core::{Epoch, EpochMeta, FeatureVector, Hands, Side, TrialOutcome, TrialRecord};
use orchard_signal::{EpochBuilder, EpochError};
use orchard_store::{SubjectStore, TestResult, session_stamp};
use orchard_stream::{StreamInlet, StreamIngestion};
use orchard_timing::{CalibrationStats, TickPacer, Timer};
use rand::Rng;
use std::sync::Arc;

/// What happened during one tick, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TrialStarted {
        trial: usize,
        target: Side,
    },
    DecisionMade {
        trial: usize,
        side: Side,
        confidence: f64,
    },
    /// The pulled window could not fill an epoch; no hand opens this trial.
    DecisionSkipped {
        trial: usize,
        expected: usize,
        actual: usize,
    },
    Caught {
        trial: usize,
        side: Side,
    },
    Missed {
        trial: usize,
        target: Side,
    },
    SessionComplete {
        score: usize,
        failures: usize,
    },
}

/// End-of-session numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub trials: usize,
    pub score: usize,
    pub failures: usize,
    pub skipped: usize,
    pub result: Option<TestResult>,
    pub timing: CalibrationStats,
    pub overruns: u64,
}

struct ActiveTrial {
    record: TrialRecord,
    target: Target,
}

/// One experiment run: a fixed number of falling targets, one decision per
/// target, and the archives written at the end.
///
/// Generic over the stream inlet, the clock and the random source so a whole
/// session can run against a simulated device with a hand-driven clock.
pub struct Session<I: StreamInlet, T: Timer, R: Rng> {
    config: Arc<ExperimentConfig>,
    context: SessionContext,
    ingestion: StreamIngestion<I>,
    timer: T,
    rng: R,
    store: SubjectStore,
    builder: EpochBuilder,
    playfield: Playfield,
    sequence: TargetSequence,
    trial_timer: TrialTimer,
    hands: Hands,
    active: Option<ActiveTrial>,
    next_trial: usize,
    history: Vec<TrialRecord>,
    epochs: Vec<Epoch>,
    features: Vec<FeatureVector>,
    predictions: Vec<u8>,
    truths: Vec<u8>,
    score: usize,
    failures: usize,
    skipped: usize,
    session_id: String,
    result: Option<TestResult>,
    complete: bool,
}

impl<I: StreamInlet, T: Timer, R: Rng> Session<I, T, R> {
    /// Validates the config, checks the stream against any model the
    /// context already holds, and primes the stream clock.
    pub fn new(
        context: SessionContext,
        ingestion: StreamIngestion<I>,
        timer: T,
        mut rng: R,
    ) -> Result<Self, SessionError> {
        let config = Arc::clone(context.config());
        config.validate()?;
        if let Some(trained) = context.source_model_layout() {
            if trained != ingestion.layout() {
                return Err(SessionError::LayoutMismatch {
                    trained,
                    stream: ingestion.layout(),
                });
            }
        }

        config
            .features
            .check_crop(&config.epoch_config(), ingestion.sample_rate())?;

        let mut ingestion = ingestion.with_correction(config.stream.correction());
        ingestion.prime()?;

        let sequence = TargetSequence::build(config.trials, &mut rng);
        let store = SubjectStore::new(&config.storage.data_root, config.subject);
        tracing::info!(
            subject = config.subject,
            mode = %config.mode,
            trials = config.trials,
            classifier = ?context.classifier().kind(),
            dir = %store.dir().display(),
            "session ready"
        );

        Ok(Self {
            builder: EpochBuilder::new(config.epoch_config()),
            playfield: Playfield::new(&config.geometry, &config.timing),
            trial_timer: TrialTimer::new(&config.timing),
            session_id: session_stamp(chrono::Local::now()),
            config,
            context,
            ingestion,
            timer,
            rng,
            store,
            sequence,
            hands: Hands::new(),
            active: None,
            next_trial: 0,
            history: Vec::new(),
            epochs: Vec::new(),
            features: Vec::new(),
            predictions: Vec::new(),
            truths: Vec::new(),
            score: 0,
            failures: 0,
            skipped: 0,
            result: None,
            complete: false,
        })
    }

    /// Replaces the shuffled target order. Only meaningful before the first
    /// tick.
    pub fn with_sequence(mut self, sequence: TargetSequence) -> Self {
        self.sequence = sequence;
        self
    }

    /// Overrides the timestamp used for the session id and archive names.
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = id.into();
        self
    }

    /// One loop iteration: the decision if due, then catch, then the fall
    /// step and miss check. A no-op once the session is complete.
    pub fn tick(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        let mut events = Vec::new();
        if self.complete {
            return Ok(events);
        }
        if self.active.is_none() {
            self.start_next_trial(&mut events)?;
            return Ok(events);
        }

        if let Some(due) = self.trial_timer.poll(self.timer.now()) {
            self.decide(due, &mut events)?;
        }

        let outcome = match self.active.as_mut() {
            None => None,
            Some(active) if self.playfield.is_caught(&active.target, &self.hands) => {
                Some(TrialOutcome::Caught)
            }
            Some(active) => {
                self.playfield.step(&mut active.target);
                self.playfield
                    .is_missed(&active.target)
                    .then_some(TrialOutcome::Missed)
            }
        };
        if let Some(outcome) = outcome {
            self.resolve(outcome, &mut events)?;
        }
        Ok(events)
    }

    /// Ticks until the session completes, pacing each tick to the
    /// configured rate, then logs the tick timing.
    pub fn run(&mut self, pacer: &mut TickPacer<T>) -> Result<SessionSummary, SessionError> {
        while !self.complete {
            for event in self.tick()? {
                tracing::trace!(?event, "session event");
            }
            pacer.finish_tick();
        }

        let timing = pacer.timer().calibration_stats();
        tracing::info!(
            mean_tick_ms = timing.average_frame_time_ns / 1e6,
            jitter_ms = timing.jitter_ns / 1e6,
            effective_fps = timing.effective_fps,
            overruns = pacer.overruns(),
            "tick timing"
        );
        Ok(SessionSummary {
            trials: self.history.len(),
            score: self.score,
            failures: self.failures,
            skipped: self.skipped,
            result: self.result.clone(),
            timing,
            overruns: pacer.overruns(),
        })
    }

    fn start_next_trial(&mut self, events: &mut Vec<SessionEvent>) -> Result<(), SessionError> {
        let side = match self.sequence.next_target() {
            Slot::Target(side) => side,
            Slot::Sentinel => {
                tracing::warn!(
                    resolved = self.score + self.failures,
                    trials = self.config.trials,
                    "target sequence exhausted before the session ended"
                );
                return self.finish(events);
            }
        };

        let dropped = self.ingestion.clear_buffer()?;
        let now = self.timer.now();
        self.trial_timer.restart(now);
        self.hands.close_all();

        let trial = self.next_trial;
        self.next_trial += 1;
        tracing::info!(trial, target = ?side, started_ns = now, dropped, "trial started");
        self.active = Some(ActiveTrial {
            record: TrialRecord::new(trial, side, now),
            target: self.playfield.spawn(side),
        });
        events.push(SessionEvent::TrialStarted { trial, target: side });
        Ok(())
    }

    /// Pulls the window, builds the epoch and asks the classifier, all
    /// inside the current tick.
    fn decide(&mut self, due: DecisionDue, events: &mut Vec<SessionEvent>) -> Result<(), SessionError> {
        let Some(active) = self.active.as_ref() else {
            return Ok(());
        };
        let trial = active.record.trial_id;
        let target = active.target;
        let started = self.timer.now();

        let window = self.ingestion.pull_window(self.config.timing.window())?;
        let pulled = window.sample_count();
        let meta = EpochMeta {
            session_id: self.session_id.clone(),
            trial_id: trial,
        };
        let screen_width = self.playfield.screen_width();

        let epoch = match self.builder.build(&window, target.x, screen_width, meta) {
            Ok(epoch) => epoch,
            Err(EpochError::Malformed { expected, actual }) => {
                self.skipped += 1;
                if let Some(active) = self.active.as_mut() {
                    active.record.samples_pulled = pulled;
                }
                tracing::warn!(trial, expected, actual, "decision skipped: malformed epoch");
                events.push(SessionEvent::DecisionSkipped {
                    trial,
                    expected,
                    actual,
                });
                return Ok(());
            }
            Err(EpochError::Signal(err)) => return Err(err.into()),
        };

        let features = if self.context.classifier().needs_features() {
            let extractor = self.context.extractor(epoch.layout())?;
            Some(extractor.extract(&epoch)?)
        } else {
            None
        };
        let input = DecisionInput {
            target_x: target.x,
            screen_width,
            features: features.as_ref(),
        };
        let decision = self.context.classifier().decide(&input, &mut self.rng)?;
        self.hands.open(decision.side);

        let latency = self.timer.elapsed(started);
        let period = self.config.timing.tick_period();
        if latency > period {
            tracing::warn!(
                trial,
                latency_ms = latency.as_secs_f64() * 1e3,
                period_ms = period.as_secs_f64() * 1e3,
                "decision overran the tick period"
            );
        }
        tracing::info!(
            trial,
            side = ?decision.side,
            confidence = decision.confidence,
            samples = pulled,
            at_ms = due.elapsed.as_secs_f64() * 1e3,
            latency_ms = latency.as_secs_f64() * 1e3,
            "decision made"
        );

        if let Some(active) = self.active.as_mut() {
            active.record.decided = Some(decision.side);
            active.record.confidence = Some(decision.confidence);
            active.record.samples_pulled = pulled;
            active.record.decision_latency_ns = Some(latency.as_nanos() as u64);
        }
        if self.config.mode.is_evaluation() {
            self.predictions.push(decision.side.label());
            self.truths.push(epoch.label().label());
        }
        if let Some(features) = features {
            self.features.push(features);
        }
        self.epochs.push(epoch);
        events.push(SessionEvent::DecisionMade {
            trial,
            side: decision.side,
            confidence: decision.confidence,
        });
        Ok(())
    }

    fn resolve(&mut self, outcome: TrialOutcome, events: &mut Vec<SessionEvent>) -> Result<(), SessionError> {
        let Some(mut active) = self.active.take() else {
            return Ok(());
        };
        self.trial_timer.resolve(outcome);
        let trial = active.record.trial_id;
        match outcome {
            TrialOutcome::Caught => {
                self.score += 1;
                events.push(SessionEvent::Caught {
                    trial,
                    side: active.target.side,
                });
            }
            TrialOutcome::Missed => {
                self.failures += 1;
                events.push(SessionEvent::Missed {
                    trial,
                    target: active.target.side,
                });
            }
            TrialOutcome::Pending => {}
        }
        active.record.outcome = outcome;
        tracing::info!(
            trial,
            ?outcome,
            score = self.score,
            failures = self.failures,
            "trial resolved"
        );
        self.history.push(active.record);

        if self.score + self.failures >= self.config.trials {
            return self.finish(events);
        }
        self.start_next_trial(events)
    }

    /// Writes the epoch archive, computes the deferred features, writes the
    /// feature archive and, when evaluating, the scores.
    /// Epochs are on disk before any feature is computed.
    fn finish(&mut self, events: &mut Vec<SessionEvent>) -> Result<(), SessionError> {
        self.complete = true;
        self.active = None;
        let mode = self.config.mode;

        if let Some(first) = self.epochs.first() {
            let layout = first.layout();
            let stamp = self.store.unused_stamp(&self.session_id);
            if stamp != self.session_id {
                tracing::warn!(
                    session = %self.session_id,
                    %stamp,
                    "archives for this minute exist; using a suffixed name"
                );
            }
            self.store.save_epochs(&stamp, &self.epochs)?;

            if mode.collects_training_data() {
                tracing::info!(epochs = self.epochs.len(), "computing features after the session");
                let extractor = self.context.extractor(layout)?;
                self.features = self
                    .epochs
                    .iter()
                    .map(|epoch| extractor.extract(epoch))
                    .collect::<Result<_, _>>()?;
            }
            self.store.save_features(&stamp, &self.features)?;
        } else {
            tracing::warn!("no epochs were recorded; nothing to archive");
        }

        if mode.is_evaluation() {
            let result = metrics::evaluate(&self.predictions, &self.truths);
            let key = self.store.append_result(&result)?;
            tracing::info!(
                key = %key,
                score = result.score,
                accuracy = result.accuracy,
                right_recall = result.right_recall,
                left_recall = result.left_recall,
                precision = result.precision,
                f1 = result.f1,
                "evaluation results"
            );
            self.result = Some(result);
        }

        tracing::info!(
            trials = self.history.len(),
            score = self.score,
            failures = self.failures,
            skipped = self.skipped,
            source_model_builds = self.context.source_model_builds(),
            "session complete"
        );
        events.push(SessionEvent::SessionComplete {
            score: self.score,
            failures: self.failures,
        });
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn history(&self) -> &[TrialRecord] {
        &self.history
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn store(&self) -> &SubjectStore {
        &self.store
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn hands(&self) -> &Hands {
        &self.hands
    }

    pub fn target(&self) -> Option<&Target> {
        self.active.as_ref().map(|a| &a.target)
    }

    pub fn trial_phase(&self) -> Option<TrialPhase> {
        self.active
            .as_ref()
            .map(|_| self.trial_timer.phase(self.timer.now()))
    }

    pub fn ingestion_mut(&mut self) -> &mut StreamIngestion<I> {
        &mut self.ingestion
    }
}
