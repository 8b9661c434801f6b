use orchard_core::ChannelLayout;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SignalError {
    /// Cutoffs must satisfy `0 < f < nyquist`.
    #[error("invalid cutoff {cutoff} Hz for sampling rate {sample_rate} Hz")]
    Filter { cutoff: f64, sample_rate: f64 },

    #[error("band ({low}, {high}) Hz is empty or inverted")]
    InvalidBand { low: f64, high: f64 },

    #[error("epoch layout {actual:?} does not match the source model layout {expected:?}")]
    LayoutMismatch {
        expected: ChannelLayout,
        actual: ChannelLayout,
    },

    #[error("crop [{tmin}, {tmax}] s lies outside the epoch [{epoch_tmin}, {epoch_tmax}] s")]
    CropOutOfRange {
        tmin: f64,
        tmax: f64,
        epoch_tmin: f64,
        epoch_tmax: f64,
    },

    #[error("crop selects no samples")]
    EmptyCrop,

    #[error("expected {expected} channels, got {actual}")]
    ChannelCount { expected: usize, actual: usize },

    /// The inverse operator could not be formed.
    #[error("source model is singular: {0}")]
    Singular(&'static str),
}

pub type SignalResult<T> = Result<T, SignalError>;

#[derive(Debug, Error, PartialEq)]
pub enum EpochError {
    /// The window cannot supply the configured span.
    #[error("malformed epoch: expected {expected} samples, window supplies {actual}")]
    Malformed { expected: usize, actual: usize },

    #[error(transparent)]
    Signal(#[from] SignalError),
}
