//! Signal conditioning between the raw stream and the classifier: zero-phase
//! filtering, marker-aligned epoching, and band power in source space.

pub mod decimate;
pub mod epoch;
pub mod error;
pub mod features;
pub mod filter;
pub mod source;

pub use decimate::decimate;
pub use epoch::{EpochBuilder, EpochConfig};
pub use error::{EpochError, SignalError, SignalResult};
pub use features::{FeatureConfig, FeatureExtractor};
pub use filter::{Biquad, Cascade};
pub use source::{ForwardSolution, HeadGeometry, NoiseCovariance, SourceModel, SourceModelOptions};
