//! The apple-catcher protocol: trial timing, target kinematics, the
//! balanced target order, and the session loop that ties acquisition,
//! decoding and storage together.

pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod playfield;
pub mod sequence;
pub mod session;
pub mod timer;

pub use config::{
    ConfigError, ExperimentConfig, GeometryConfig, PreprocessingConfig, StorageConfig,
    StreamConfig, TimingConfig,
};
pub use context::SessionContext;
pub use error::SessionError;
pub use metrics::evaluate;
pub use playfield::{Playfield, Target};
pub use sequence::{Slot, TargetSequence};
pub use session::{Session, SessionEvent, SessionSummary};
pub use timer::{DecisionDue, TrialPhase, TrialTimer};
