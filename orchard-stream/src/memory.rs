use crate::error::{StreamError, StreamResult};
use crate::inlet::{Chunk, StreamInfo, StreamInlet};
use std::collections::VecDeque;
use std::time::Duration;

/// Inlet backed by an in-process queue. Whatever has been pushed is what a
/// pull can see, which makes under-runs easy to stage.
#[derive(Debug, Clone)]
pub struct MemoryInlet {
    info: StreamInfo,
    queue: VecDeque<(Vec<f32>, f64)>,
    offset: f64,
    connected: bool,
}

impl MemoryInlet {
    pub fn new(info: StreamInfo) -> Self {
        Self {
            info,
            queue: VecDeque::new(),
            offset: 0.0,
            connected: true,
        }
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn push_sample(&mut self, sample: Vec<f32>, timestamp: f64) {
        self.queue.push_back((sample, timestamp));
    }

    /// Queues `count` samples at the nominal rate starting at `t0`, each
    /// channel carrying `f(channel, sample_index)`.
    pub fn push_ramp(&mut self, t0: f64, count: usize, f: impl Fn(usize, usize) -> f32) {
        let dt = 1.0 / self.info.nominal_srate;
        for i in 0..count {
            let sample = (0..self.info.channel_count).map(|ch| f(ch, i)).collect();
            self.push_sample(sample, t0 + i as f64 * dt);
        }
    }

    pub fn buffered(&self) -> usize {
        self.queue.len()
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }
}

impl StreamInlet for MemoryInlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn pull_chunk(&mut self, max_samples: usize) -> StreamResult<Chunk> {
        if !self.connected && self.queue.is_empty() {
            return Err(StreamError::Disconnected);
        }
        let n = max_samples.min(self.queue.len());
        let mut chunk = Chunk::default();
        for (sample, ts) in self.queue.drain(..n) {
            chunk.samples.push(sample);
            chunk.timestamps.push(ts);
        }
        Ok(chunk)
    }

    fn pull_sample(&mut self, _timeout: Duration) -> StreamResult<Option<(Vec<f32>, f64)>> {
        if !self.connected && self.queue.is_empty() {
            return Err(StreamError::Disconnected);
        }
        Ok(self.queue.pop_front())
    }

    fn time_correction(&mut self) -> StreamResult<f64> {
        Ok(self.offset)
    }
}
