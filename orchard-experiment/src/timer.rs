use crate::config::{secs_to_ns, TimingConfig};
use orchard_core::TrialOutcome;
use std::time::Duration;

/// Where a trial stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialPhase {
    BeforeMarker,
    MarkerActive,
    Settling,
    Decided,
    Resolved(TrialOutcome),
}

/// Returned by [`TrialTimer::poll`] on the one poll that crosses the
/// decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionDue {
    /// Time since trial start at the crossing poll.
    pub elapsed: Duration,
}

/// Per-trial clock that gates exactly one decision.
///
/// Phases up to `Decided` follow elapsed time only. The decision guard is
/// set inside the same `poll` that reports it, so a late or repeated poll
/// can neither skip nor repeat it.
#[derive(Debug, Clone)]
pub struct TrialTimer {
    before_ns: u64,
    marker_ns: u64,
    settle_ns: u64,
    started_ns: u64,
    decided: bool,
    outcome: Option<TrialOutcome>,
}

impl TrialTimer {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            before_ns: secs_to_ns(timing.before_marker_secs),
            marker_ns: secs_to_ns(timing.marker_secs),
            settle_ns: secs_to_ns(timing.settle_secs),
            started_ns: 0,
            decided: false,
            outcome: None,
        }
    }

    /// Starts a new trial at `now_ns` and clears the guard.
    pub fn restart(&mut self, now_ns: u64) {
        self.started_ns = now_ns;
        self.decided = false;
        self.outcome = None;
    }

    pub fn started_ns(&self) -> u64 {
        self.started_ns
    }

    pub fn elapsed(&self, now_ns: u64) -> Duration {
        Duration::from_nanos(now_ns.saturating_sub(self.started_ns))
    }

    fn threshold_ns(&self) -> u64 {
        self.before_ns + self.marker_ns + self.settle_ns
    }

    pub fn phase(&self, now_ns: u64) -> TrialPhase {
        if let Some(outcome) = self.outcome {
            return TrialPhase::Resolved(outcome);
        }
        if self.decided {
            return TrialPhase::Decided;
        }
        let elapsed = now_ns.saturating_sub(self.started_ns);
        if elapsed < self.before_ns {
            TrialPhase::BeforeMarker
        } else if elapsed < self.before_ns + self.marker_ns {
            TrialPhase::MarkerActive
        } else {
            TrialPhase::Settling
        }
    }

    /// Fires once, on the first poll strictly past
    /// `before + marker + settle`.
    pub fn poll(&mut self, now_ns: u64) -> Option<DecisionDue> {
        if self.decided || self.outcome.is_some() {
            return None;
        }
        let elapsed = now_ns.saturating_sub(self.started_ns);
        if elapsed > self.threshold_ns() {
            self.decided = true;
            Some(DecisionDue {
                elapsed: Duration::from_nanos(elapsed),
            })
        } else {
            None
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decided
    }

    /// Ends the trial. Accepted from any unresolved phase; returns `false`
    /// if the trial already ended.
    pub fn resolve(&mut self, outcome: TrialOutcome) -> bool {
        if self.outcome.is_some() || outcome == TrialOutcome::Pending {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = 1_000_000_000;

    fn timer() -> TrialTimer {
        let mut t = TrialTimer::new(&TimingConfig::default());
        t.restart(10 * SEC);
        t
    }

    #[test]
    fn phases_follow_elapsed_time() {
        let t = timer();
        assert_eq!(t.phase(10 * SEC), TrialPhase::BeforeMarker);
        assert_eq!(t.phase(13 * SEC), TrialPhase::MarkerActive);
        assert_eq!(t.phase(16 * SEC + SEC / 4), TrialPhase::Settling);
    }

    #[test]
    fn decision_fires_exactly_once() {
        let mut t = timer();
        assert_eq!(t.poll(16 * SEC + SEC / 2), None, "threshold is exclusive");
        let due = t.poll(16 * SEC + SEC / 2 + 1).unwrap();
        assert_eq!(due.elapsed, Duration::from_nanos(6 * SEC + SEC / 2 + 1));
        for late in 1..100 {
            assert_eq!(t.poll(17 * SEC + late * SEC), None);
        }
        assert_eq!(t.phase(20 * SEC), TrialPhase::Decided);
    }

    #[test]
    fn a_skipped_tick_still_decides() {
        let mut t = timer();
        assert!(t.poll(19 * SEC).is_some());
        assert!(t.poll(19 * SEC).is_none());
    }

    #[test]
    fn resolution_is_final_and_restart_rearms() {
        let mut t = timer();
        assert!(t.resolve(TrialOutcome::Missed));
        assert!(!t.resolve(TrialOutcome::Caught));
        assert_eq!(t.poll(30 * SEC), None);
        assert_eq!(t.phase(30 * SEC), TrialPhase::Resolved(TrialOutcome::Missed));

        t.restart(40 * SEC);
        assert!(!t.is_decided());
        assert_eq!(t.phase(40 * SEC), TrialPhase::BeforeMarker);
        assert!(t.poll(47 * SEC).is_some());
    }
}
