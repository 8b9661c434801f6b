use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Session mode chosen once at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Data collection with hands driven by the target position.
    #[default]
    Training,
    /// Data collection with a mix of positional and random decisions.
    Define,
    /// Evaluation with the subject's fitted classifier.
    Test,
}

/// Decision capability a mode maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    Positional,
    Randomized,
    Learned,
}

impl SessionMode {
    pub fn decision_kind(self) -> DecisionKind {
        match self {
            SessionMode::Training => DecisionKind::Positional,
            SessionMode::Define => DecisionKind::Randomized,
            SessionMode::Test => DecisionKind::Learned,
        }
    }

    /// Modes whose purpose is to collect labelled data for later training.
    pub fn collects_training_data(self) -> bool {
        !self.is_evaluation()
    }

    pub fn is_evaluation(self) -> bool {
        matches!(self, SessionMode::Test)
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionMode::Training => "training",
            SessionMode::Define => "define",
            SessionMode::Test => "test",
        };
        f.write_str(name)
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "training" => Ok(SessionMode::Training),
            "define" => Ok(SessionMode::Define),
            "test" => Ok(SessionMode::Test),
            other => Err(format!("unknown session mode '{other}'")),
        }
    }
}
