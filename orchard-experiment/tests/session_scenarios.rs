use orchard_classify::train;
use orchard_core::{ChannelLayout, SessionMode, Side, TrialOutcome};
use orchard_experiment::{
    ExperimentConfig, Session, SessionContext, SessionError, SessionEvent, TargetSequence,
};
use orchard_stream::{MemoryInlet, SimulatedInlet, SimulationOptions, StreamInfo, StreamIngestion};
use orchard_timing::{ManualTimer, TickPacer, Timer};
use orchard_signal::SignalError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config(root: &Path, mode: SessionMode, trials: usize) -> Arc<ExperimentConfig> {
    let mut config = ExperimentConfig::new(1, mode);
    config.trials = trials;
    config.storage.data_root = root.to_path_buf();
    config.source_model.n_sources = 64;
    Arc::new(config)
}

fn simulated(
    timer: &ManualTimer,
    layout: ChannelLayout,
) -> StreamIngestion<SimulatedInlet<ManualTimer>> {
    let inlet = SimulatedInlet::new(
        "Explore_8547_ExG",
        layout,
        timer.clone(),
        SimulationOptions::default(),
    );
    StreamIngestion::from_inlet(inlet).unwrap()
}

fn tick_period() -> Duration {
    Duration::from_nanos(1_000_000_000 / 30)
}

#[test]
fn positional_session_catches_every_target() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), SessionMode::Training, 4);
    let timer = ManualTimer::new();
    let context = SessionContext::for_collection(Arc::clone(&config)).unwrap();
    let order = [Side::Left, Side::Right, Side::Left, Side::Right];

    let mut session = Session::new(
        context,
        simulated(&timer, ChannelLayout::Eight),
        timer.clone(),
        StdRng::seed_from_u64(1),
    )
    .unwrap()
    .with_sequence(TargetSequence::from_sides(order))
    .with_session_id("2024-01-01_1200");

    let mut pacer = TickPacer::new(timer.clone(), config.timing.fps);
    let summary = session.run(&mut pacer).unwrap();

    assert_eq!(summary.score, 4);
    assert_eq!(summary.failures, 0);
    assert_eq!(summary.skipped, 0);
    assert!(summary.result.is_none());
    assert!((summary.timing.effective_fps - 30.0).abs() < 0.5);

    let targets: Vec<Side> = session.history().iter().map(|r| r.target).collect();
    assert_eq!(targets, order);
    for record in session.history() {
        assert_eq!(record.outcome, TrialOutcome::Caught);
        assert_eq!(record.decided, Some(record.target));
        assert_eq!(record.samples_pulled, 1500);
    }

    // Complete sessions issue nothing further.
    let before = timer.now();
    for _ in 0..50 {
        timer.advance(tick_period());
        assert!(session.tick().unwrap().is_empty());
    }
    assert!(timer.now() > before);
    assert_eq!(session.history().len(), 4);

    // Features were computed once, after the game, from a single model.
    assert_eq!(session.context().source_model_builds(), 1);
    let store = session.store();
    let pairs = store.training_pairs().unwrap();
    assert_eq!(pairs.len(), 1);
    let epochs = store.load_epochs(&pairs[0].epochs).unwrap();
    assert_eq!(epochs.epochs.len(), 4);
    assert!(epochs.epochs.iter().all(|e| e.sample_count() == 1488));
    assert_eq!(epochs.labels(), vec![0, 1, 0, 1]);
    let features = store.load_features(&pairs[0].features).unwrap();
    assert_eq!((features.rows, features.cols), (4, 2 * 64));
}

#[test]
fn empty_buffer_skips_the_decision_and_the_target_is_missed() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), SessionMode::Training, 2);
    let timer = ManualTimer::new();
    let inlet = MemoryInlet::new(StreamInfo::new("Explore_8547_ExG", 8, 250.0));
    let context = SessionContext::for_collection(Arc::clone(&config)).unwrap();
    let mut session = Session::new(
        context,
        StreamIngestion::from_inlet(inlet).unwrap(),
        timer.clone(),
        StdRng::seed_from_u64(2),
    )
    .unwrap();

    let mut events = Vec::new();
    while !session.is_complete() {
        events.extend(session.tick().unwrap());
        timer.advance(tick_period());
    }

    let skipped: Vec<&SessionEvent> = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::DecisionSkipped { .. }))
        .collect();
    assert_eq!(skipped.len(), 2);
    assert!(skipped.iter().all(|e| matches!(
        e,
        SessionEvent::DecisionSkipped {
            expected: 1488,
            actual: 0,
            ..
        }
    )));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::DecisionMade { .. })));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Missed { .. }))
            .count(),
        2
    );
    assert_eq!(
        events.last(),
        Some(&SessionEvent::SessionComplete {
            score: 0,
            failures: 2
        })
    );
    assert!(session.history().iter().all(|r| r.decided.is_none()));
    assert!(session.store().training_pairs().unwrap().is_empty());
}

#[test]
fn short_window_is_flagged_with_its_sample_count() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), SessionMode::Training, 2);
    let timer = ManualTimer::new();
    let inlet = MemoryInlet::new(StreamInfo::new("Explore_8547_ExG", 8, 250.0));
    let context = SessionContext::for_collection(Arc::clone(&config)).unwrap();
    let mut session = Session::new(
        context,
        StreamIngestion::from_inlet(inlet).unwrap(),
        timer.clone(),
        StdRng::seed_from_u64(2),
    )
    .unwrap();

    // The first tick starts the trial and drains the buffer.
    let started = session.tick().unwrap();
    assert!(matches!(started[..], [SessionEvent::TrialStarted { trial: 0, .. }]));
    session
        .ingestion_mut()
        .inlet_mut()
        .push_ramp(0.0, 1000, |ch, i| (ch + i) as f32 * 1e-6);

    let mut skipped = None;
    for _ in 0..300 {
        timer.advance(tick_period());
        for event in session.tick().unwrap() {
            if let SessionEvent::DecisionSkipped { expected, actual, .. } = event {
                skipped = Some((expected, actual));
            }
        }
        if skipped.is_some() {
            break;
        }
    }
    assert_eq!(skipped, Some((1488, 989)));
    assert_eq!(session.history().len(), 0, "trial still falling");
}

#[test]
fn one_decision_per_trial_even_when_ticks_are_late() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), SessionMode::Define, 4);
    let timer = ManualTimer::new();
    let context = SessionContext::for_collection(Arc::clone(&config)).unwrap();
    let mut session = Session::new(
        context,
        simulated(&timer, ChannelLayout::Eight),
        timer.clone(),
        StdRng::seed_from_u64(3),
    )
    .unwrap()
    .with_session_id("2024-01-01_1400");

    let mut decisions = [0usize; 4];
    let mut ticks = 0u64;
    while !session.is_complete() {
        for event in session.tick().unwrap() {
            if let SessionEvent::DecisionMade { trial, .. } = event {
                decisions[trial] += 1;
            }
        }
        // Alternate fast and stalled ticks.
        let step = if ticks % 3 == 0 { 60 } else { 20 };
        timer.advance(Duration::from_millis(step));
        ticks += 1;
    }

    assert_eq!(decisions, [1, 1, 1, 1]);
    assert_eq!(session.score() + session.failures(), 4);
    assert!(session.history().iter().all(|r| r.decided.is_some()));
    // Randomized mode still computes features for every epoch.
    assert_eq!(session.features().len(), 4);
    assert_eq!(session.context().source_model_builds(), 1);
}

#[test]
fn evaluation_uses_the_trained_model_and_appends_results() {
    let dir = TempDir::new().unwrap();

    // Collect a labelled session first.
    let training = config(dir.path(), SessionMode::Training, 4);
    let timer = ManualTimer::new();
    let mut collect = Session::new(
        SessionContext::for_collection(Arc::clone(&training)).unwrap(),
        simulated(&timer, ChannelLayout::Eight),
        timer.clone(),
        StdRng::seed_from_u64(4),
    )
    .unwrap()
    .with_session_id("2024-01-01_1200");
    collect
        .run(&mut TickPacer::new(timer.clone(), training.timing.fps))
        .unwrap();

    let trained = train(collect.store()).unwrap();
    assert_eq!(trained.layout, ChannelLayout::Eight);

    let test = config(dir.path(), SessionMode::Test, 4);
    let context = SessionContext::for_evaluation(Arc::clone(&test), trained.clone()).unwrap();
    assert_eq!(context.source_model_builds(), 1);

    let timer = ManualTimer::new();
    let mut session = Session::new(
        context,
        simulated(&timer, ChannelLayout::Eight),
        timer.clone(),
        StdRng::seed_from_u64(5),
    )
    .unwrap()
    .with_session_id("2024-01-01_1300");
    let summary = session
        .run(&mut TickPacer::new(timer.clone(), test.timing.fps))
        .unwrap();

    assert_eq!(session.context().source_model_builds(), 1);
    let result = summary.result.unwrap();
    assert_eq!(result.predictions.len(), 4);
    assert_eq!(result.y_test.len(), 4);
    assert_eq!(summary.score, result.score);
    assert_eq!(summary.score + summary.failures, 4);
    assert_eq!(session.features().len(), session.epochs().len());

    let results = session.store().load_results();
    assert!(results.contains_key("test_1"));
    assert_eq!(session.store().training_pairs().unwrap().len(), 2);

    // Features configured differently from training are rejected before any
    // trial runs.
    let mut narrower = (*test).clone();
    narrower.source_model.n_sources = 32;
    assert!(matches!(
        SessionContext::for_evaluation(Arc::new(narrower), trained.clone()),
        Err(SessionError::FeatureLength {
            trained: 128,
            configured: 64
        })
    ));

    // A classifier trained on eight channels cannot read a four-channel stream.
    let mismatched = Session::new(
        SessionContext::for_evaluation(Arc::clone(&test), trained).unwrap(),
        simulated(&timer, ChannelLayout::Four),
        timer.clone(),
        StdRng::seed_from_u64(6),
    );
    assert!(matches!(
        mismatched,
        Err(SessionError::LayoutMismatch {
            trained: ChannelLayout::Eight,
            stream: ChannelLayout::Four
        })
    ));
}

#[test]
fn crop_past_the_last_sample_is_rejected_at_setup() {
    let dir = TempDir::new().unwrap();
    let mut config = (*config(dir.path(), SessionMode::Training, 2)).clone();
    // Inside [tmin, tmax) but past the final sample at 250 Hz.
    config.features.crop = (-0.1, 2.999);
    config.validate().unwrap();

    let timer = ManualTimer::new();
    let session = Session::new(
        SessionContext::for_collection(Arc::new(config)).unwrap(),
        simulated(&timer, ChannelLayout::Eight),
        timer.clone(),
        StdRng::seed_from_u64(7),
    );
    assert!(matches!(
        session,
        Err(SessionError::Signal(SignalError::CropOutOfRange { .. }))
    ));
    assert!(!dir.path().join("s01").exists());
}

#[test]
fn sessions_in_the_same_minute_keep_separate_archives() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), SessionMode::Training, 2);
    for seed in [8, 9] {
        let timer = ManualTimer::new();
        let mut session = Session::new(
            SessionContext::for_collection(Arc::clone(&config)).unwrap(),
            simulated(&timer, ChannelLayout::Eight),
            timer.clone(),
            StdRng::seed_from_u64(seed),
        )
        .unwrap()
        .with_session_id("2024-01-01_1200");
        session
            .run(&mut TickPacer::new(timer.clone(), config.timing.fps))
            .unwrap();
    }

    let store = orchard_store::SubjectStore::new(dir.path(), 1);
    let pairs = store.training_pairs().unwrap();
    assert_eq!(pairs.len(), 2);
    assert!(store.epoch_path("2024-01-01_1200_2").is_file());
    assert!(store.feature_path("2024-01-01_1200_2").is_file());
}
