//! Subject-scoped persistence: per-session epoch and feature archives, and
//! the cumulative results record.

pub mod archive;
pub mod error;
pub mod results;
pub mod subject;

pub use archive::{EpochArchive, FeatureArchive, ARCHIVE_FORMAT};
pub use error::{StoreError, StoreResult};
pub use results::TestResult;
pub use subject::{session_stamp, SubjectStore, TrainingPair};
