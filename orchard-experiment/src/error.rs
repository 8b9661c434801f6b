use crate::config::ConfigError;
use orchard_classify::ClassifyError;
use orchard_core::{ChannelLayout, SessionMode};
use orchard_signal::SignalError;
use orchard_store::StoreError;
use orchard_stream::StreamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no built-in classifier for {0} mode")]
    MissingClassifier(SessionMode),

    #[error("classifier was trained on {trained:?} but the stream carries {stream:?}")]
    LayoutMismatch {
        trained: ChannelLayout,
        stream: ChannelLayout,
    },

    #[error("classifier expects {trained} features but the config produces {configured}")]
    FeatureLength { trained: usize, configured: usize },
}
