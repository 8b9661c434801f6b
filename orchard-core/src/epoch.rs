use crate::layout::ChannelLayout;
use crate::side::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochMeta {
    pub session_id: String,
    pub trial_id: usize,
}

/// Marker-aligned, labelled analysis window.
///
/// `data` holds the filtered signal channel-major. The average reference is
/// kept as a projection flag and only applied by [`Epoch::projected`], so the
/// stored samples stay as they were recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    data: Vec<Vec<f64>>,
    sample_rate: f64,
    layout: ChannelLayout,
    /// Time of the first sample relative to the marker, in seconds.
    tmin: f64,
    /// Marker position inside the window the epoch was cut from.
    marker_index: usize,
    label: Side,
    average_reference: bool,
    meta: EpochMeta,
}

impl Epoch {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data: Vec<Vec<f64>>,
        sample_rate: f64,
        layout: ChannelLayout,
        tmin: f64,
        marker_index: usize,
        label: Side,
        average_reference: bool,
        meta: EpochMeta,
    ) -> Self {
        Self {
            data,
            sample_rate,
            layout,
            tmin,
            marker_index,
            label,
            average_reference,
            meta,
        }
    }

    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// Samples with the average-reference projection applied when active.
    pub fn projected(&self) -> Vec<Vec<f64>> {
        if !self.average_reference || self.data.is_empty() {
            return self.data.clone();
        }
        let channels = self.data.len() as f64;
        let mut out = self.data.clone();
        for t in 0..self.sample_count() {
            let mean = self.data.iter().map(|ch| ch[t]).sum::<f64>() / channels;
            for ch in out.iter_mut() {
                ch[t] -= mean;
            }
        }
        out
    }

    pub fn sample_count(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    pub fn channel_count(&self) -> usize {
        self.data.len()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn tmin(&self) -> f64 {
        self.tmin
    }

    /// Time of the last sample relative to the marker.
    pub fn tmax(&self) -> f64 {
        self.tmin + self.sample_count().saturating_sub(1) as f64 / self.sample_rate
    }

    pub fn marker_index(&self) -> usize {
        self.marker_index
    }

    pub fn label(&self) -> Side {
        self.label
    }

    pub fn has_average_reference(&self) -> bool {
        self.average_reference
    }

    pub fn meta(&self) -> &EpochMeta {
        &self.meta
    }

    /// Sample index of a marker-relative time, rounded to the nearest sample.
    pub fn index_of(&self, time_secs: f64) -> isize {
        ((time_secs - self.tmin) * self.sample_rate).round() as isize
    }
}

/// Stacked band-power summaries for one epoch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(average_reference: bool) -> Epoch {
        Epoch::new(
            vec![
                vec![1.0, 2.0, 3.0],
                vec![3.0, 2.0, 1.0],
                vec![2.0, 5.0, 2.0],
                vec![2.0, 3.0, 6.0],
            ],
            100.0,
            ChannelLayout::Four,
            -0.01,
            4,
            Side::Right,
            average_reference,
            EpochMeta {
                session_id: "s".into(),
                trial_id: 0,
            },
        )
    }

    #[test]
    fn projection_sums_to_zero_without_touching_storage() {
        let e = epoch(true);
        let projected = e.projected();
        for t in 0..e.sample_count() {
            let sum: f64 = projected.iter().map(|ch| ch[t]).sum();
            assert!(sum.abs() < 1e-12);
        }
        assert_eq!(e.data()[0], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn inactive_projection_is_identity() {
        let e = epoch(false);
        assert_eq!(e.projected(), e.data().to_vec());
    }

    #[test]
    fn time_axis_is_marker_relative() {
        let e = epoch(false);
        assert_eq!(e.index_of(-0.01), 0);
        assert_eq!(e.index_of(0.0), 1);
        assert!((e.tmax() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn feature_vector_serializes_as_plain_array() {
        let fv = FeatureVector(vec![1.0, 2.5]);
        assert_eq!(serde_json::to_string(&fv).unwrap(), "[1.0,2.5]");
    }
}
