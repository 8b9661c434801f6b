use orchard_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    /// The learned pipeline was asked to decide without features.
    #[error("no feature vector supplied")]
    MissingFeatures,

    #[error("feature vector has {actual} values, the model expects {expected}")]
    FeatureLength { expected: usize, actual: usize },

    #[error("screen width must be positive")]
    InvalidGeometry,
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("mismatch between epoch archives ({epochs}) and feature archives ({features})")]
    Mismatch { epochs: usize, features: usize },

    #[error("no training data available for this subject; collect data in training mode first")]
    NoTrainingData,

    #[error("training data contains a single class")]
    SingleClass,

    #[error("archived data is inconsistent: {0}")]
    ShapeMismatch(String),

    /// The fitted model would be numerically meaningless.
    #[error("could not fit the model: {0}")]
    Degenerate(&'static str),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TrainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ArchiveMismatch { epochs, features } => {
                TrainError::Mismatch { epochs, features }
            }
            other => TrainError::Store(other),
        }
    }
}
