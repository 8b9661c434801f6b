use crate::side::Side;
use serde::{Deserialize, Serialize};

/// How a trial ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialOutcome {
    Pending,
    Caught,
    Missed,
}

/// Recorded result per trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_id: usize,
    pub target: Side,
    pub decided: Option<Side>,
    pub confidence: Option<f64>,
    pub outcome: TrialOutcome,
    pub samples_pulled: usize,
    pub decision_latency_ns: Option<u64>,
    pub started_ns: u64,
}

impl TrialRecord {
    pub fn new(trial_id: usize, target: Side, started_ns: u64) -> Self {
        Self {
            trial_id,
            target,
            decided: None,
            confidence: None,
            outcome: TrialOutcome::Pending,
            samples_pulled: 0,
            decision_latency_ns: None,
            started_ns,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome != TrialOutcome::Pending
    }
}
