//! Hand-opening decisions: the positional baseline, the mixed policy used
//! while collecting data, and the fitted linear pipeline.

pub mod classifier;
pub mod error;
pub mod pipeline;
pub mod train;

pub use classifier::{
    Classifier, Decision, DecisionInput, LearnedClassifier, PositionalClassifier,
    RandomizedClassifier, for_mode,
};
pub use error::{ClassifyError, TrainError};
pub use pipeline::{Lda, LinearPipeline, Pca, StandardScaler};
pub use train::{train, TrainedModel};
