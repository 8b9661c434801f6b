use thiserror::Error;

/// Errors raised while resolving or reading an acquisition stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Network or socket failure.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Nothing answered discovery under the requested name.
    #[error("no stream named '{name}' could be resolved")]
    NoStreamsFound { name: String },

    /// Channel count outside the four supported montages.
    #[error("unsupported channel count {count}; expected one of 4, 8, 32 or 64")]
    UnsupportedChannelCount { count: usize },

    /// Stream metadata could not be used.
    #[error("invalid stream info: {0}")]
    InvalidInfo(String),

    /// The remote end went away.
    #[error("stream disconnected")]
    Disconnected,
}

pub type StreamResult<T> = Result<T, StreamError>;
