use crate::layout::ChannelLayout;
use serde::{Deserialize, Serialize};

/// Raw buffered samples pulled from the acquisition stream for one trial.
///
/// `data` is channel-major: `data[channel][sample]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleWindow {
    pub data: Vec<Vec<f64>>,
    pub timestamps: Vec<f64>,
    pub sample_rate: f64,
    pub layout: ChannelLayout,
}

impl SampleWindow {
    pub fn empty(layout: ChannelLayout, sample_rate: f64) -> Self {
        Self {
            data: vec![Vec::new(); layout.channel_count()],
            timestamps: Vec::new(),
            sample_rate,
            layout,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn channel_count(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Duration covered at the nominal rate.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.sample_count() as f64 / self.sample_rate
        } else {
            0.0
        }
    }
}
