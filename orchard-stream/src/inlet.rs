use crate::error::StreamResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metadata a stream advertises during discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    #[serde(rename = "type", default = "default_stream_type")]
    pub stream_type: String,
    pub channel_count: usize,
    pub nominal_srate: f64,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub hostname: String,
    /// TCP data port; zero for streams that are not network-backed.
    #[serde(default)]
    pub port: u16,
}

fn default_stream_type() -> String {
    "EEG".to_string()
}

impl StreamInfo {
    pub fn new(name: &str, channel_count: usize, nominal_srate: f64) -> Self {
        Self {
            name: name.to_string(),
            stream_type: default_stream_type(),
            channel_count,
            nominal_srate,
            source_id: String::new(),
            hostname: String::new(),
            port: 0,
        }
    }
}

/// A batch of samples in transport order, sample-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub samples: Vec<Vec<f32>>,
    pub timestamps: Vec<f64>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Connection to one stream.
pub trait StreamInlet: Send {
    fn info(&self) -> &StreamInfo;

    /// Returns up to `max_samples` buffered samples, oldest first, without
    /// waiting for more to arrive.
    fn pull_chunk(&mut self, max_samples: usize) -> StreamResult<Chunk>;

    /// Waits up to `timeout` for a single sample.
    fn pull_sample(&mut self, timeout: Duration) -> StreamResult<Option<(Vec<f32>, f64)>>;

    /// Seconds to add to stream timestamps to express them on the local clock.
    fn time_correction(&mut self) -> StreamResult<f64>;
}

/// Finds a stream by its logical name.
pub trait StreamResolver {
    type Inlet: StreamInlet;

    fn resolve(&self, name: &str, timeout: Duration) -> StreamResult<Self::Inlet>;
}
