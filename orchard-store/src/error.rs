use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Epoch and feature archives must come in pairs.
    #[error("found {epochs} epoch archives but {features} feature archives")]
    ArchiveMismatch { epochs: usize, features: usize },

    #[error("unsupported archive format {found} in {path}")]
    Format { path: PathBuf, found: u32 },

    /// Feature rows disagree in length.
    #[error("ragged feature matrix: row {row} has {len} columns, expected {expected}")]
    Ragged {
        row: usize,
        len: usize,
        expected: usize,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
