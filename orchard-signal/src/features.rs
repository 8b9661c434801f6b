use crate::decimate::decimate;
use crate::epoch::EpochConfig;
use crate::error::{SignalError, SignalResult};
use crate::filter::Cascade;
use crate::source::SourceModel;
use orchard_core::{Epoch, FeatureVector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// `(low, high)` pass bands in Hz, in output order.
    pub bands: Vec<(f64, f64)>,
    pub decimation: usize,
    /// Analysis window relative to the marker, in seconds, inclusive.
    pub crop: (f64, f64),
    pub filter_order: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            bands: vec![(7.0, 11.0), (9.0, 13.0)],
            decimation: 1,
            crop: (-0.1, 1.4),
            filter_order: 4,
        }
    }
}

impl FeatureConfig {
    /// Fails when the crop does not fit inside epochs cut with `epoch` at
    /// `sample_rate`, using the same sample grid as extraction.
    pub fn check_crop(&self, epoch: &EpochConfig, sample_rate: f64) -> SignalResult<()> {
        let factor = self.decimation.max(1);
        let epoch_tmin = (epoch.tmin * sample_rate).round() / sample_rate;
        let samples = epoch.expected_len(sample_rate);
        let (first, last) = crop_bounds(self.crop, epoch_tmin, sample_rate / factor as f64);
        if first < 0 || last >= samples.div_ceil(factor) as isize {
            return Err(SignalError::CropOutOfRange {
                tmin: self.crop.0,
                tmax: self.crop.1,
                epoch_tmin,
                epoch_tmax: epoch_tmin + samples.saturating_sub(1) as f64 / sample_rate,
            });
        }
        if last < first {
            return Err(SignalError::EmptyCrop);
        }
        Ok(())
    }
}

fn crop_bounds(crop: (f64, f64), epoch_tmin: f64, rate: f64) -> (isize, isize) {
    let first = ((crop.0 - epoch_tmin) * rate).round() as isize;
    let last = ((crop.1 - epoch_tmin) * rate).round() as isize;
    (first, last)
}

/// Band power per source, stacked band after band.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    model: Arc<SourceModel>,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig, model: Arc<SourceModel>) -> Self {
        Self { config, model }
    }

    /// Length of every vector this extractor produces.
    pub fn feature_len(&self) -> usize {
        self.config.bands.len() * self.model.n_sources()
    }

    pub fn model(&self) -> &Arc<SourceModel> {
        &self.model
    }

    pub fn extract(&self, epoch: &Epoch) -> SignalResult<FeatureVector> {
        if epoch.layout() != self.model.layout() {
            return Err(SignalError::LayoutMismatch {
                expected: self.model.layout(),
                actual: epoch.layout(),
            });
        }

        let data = epoch.projected();
        let factor = self.config.decimation.max(1);
        let rate = epoch.sample_rate() / factor as f64;
        let mut features = Vec::with_capacity(self.feature_len());

        for &(low, high) in &self.config.bands {
            let cascade =
                Cascade::butterworth_bandpass(self.config.filter_order, epoch.sample_rate(), low, high)?;
            let filtered: Vec<Vec<f64>> = data.iter().map(|ch| cascade.filtfilt(ch)).collect();
            let reduced = decimate(&filtered, factor);

            let (start, end) = self.crop_range(epoch, rate, reduced.first().map_or(0, Vec::len))?;
            let cropped: Vec<Vec<f64>> = reduced.iter().map(|ch| ch[start..end].to_vec()).collect();
            features.extend(self.model.source_power(&cropped)?);
        }

        Ok(FeatureVector(features))
    }

    fn crop_range(&self, epoch: &Epoch, rate: f64, len: usize) -> SignalResult<(usize, usize)> {
        let (tmin, tmax) = self.config.crop;
        let (first, last) = crop_bounds(self.config.crop, epoch.tmin(), rate);
        if first < 0 || last >= len as isize {
            return Err(SignalError::CropOutOfRange {
                tmin,
                tmax,
                epoch_tmin: epoch.tmin(),
                epoch_tmax: epoch.tmax(),
            });
        }
        if last < first {
            return Err(SignalError::EmptyCrop);
        }
        Ok((first as usize, last as usize + 1))
    }
}
