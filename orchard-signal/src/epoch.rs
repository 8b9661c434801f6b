use crate::error::EpochError;
use crate::filter::Cascade;
use orchard_core::{Epoch, EpochMeta, SampleWindow, Side};
use serde::{Deserialize, Serialize};

/// Conditioning and windowing applied to every trial's raw samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochConfig {
    pub l_freq: f64,
    pub h_freq: f64,
    pub notch_freq: f64,
    /// Transition band of the notch, in Hz.
    pub notch_width: f64,
    pub filter_order: usize,
    /// Time from window start to the marker, in seconds.
    pub before_marker_secs: f64,
    /// Window bounds relative to the marker, in seconds.
    pub tmin: f64,
    pub tmax: f64,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            l_freq: 1.0,
            h_freq: 50.0,
            notch_freq: 50.0,
            notch_width: 2.0,
            filter_order: 4,
            before_marker_secs: 3.0,
            tmin: -3.0 + 0.05,
            tmax: 3.0,
        }
    }
}

impl EpochConfig {
    /// Marker-aligned bounds for a given pre-marker and marker duration.
    pub fn aligned(before_marker_secs: f64, marker_secs: f64) -> Self {
        Self {
            before_marker_secs,
            tmin: -before_marker_secs + 0.05,
            tmax: marker_secs,
            ..Self::default()
        }
    }

    /// Zero-based marker sample.
    pub fn marker_index(&self, sample_rate: f64) -> isize {
        (self.before_marker_secs * sample_rate).round() as isize - 1
    }

    /// Fixed sample count of every epoch at `sample_rate`.
    pub fn expected_len(&self, sample_rate: f64) -> usize {
        ((self.tmax - self.tmin) * sample_rate).round().max(0.0) as usize
    }
}

/// Turns a pulled window into a labelled, fixed-length [`Epoch`].
#[derive(Debug, Clone)]
pub struct EpochBuilder {
    config: EpochConfig,
}

impl EpochBuilder {
    pub fn new(config: EpochConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EpochConfig {
        &self.config
    }

    /// Filters the whole window, then cuts `[marker + tmin, marker + tmax)`.
    ///
    /// The label is the side of `target_x` against the screen center. A
    /// window too short for the span is rejected before any filtering.
    pub fn build(
        &self,
        window: &SampleWindow,
        target_x: f32,
        screen_width: f32,
        meta: EpochMeta,
    ) -> Result<Epoch, EpochError> {
        let sr = window.sample_rate;
        let expected = self.config.expected_len(sr);
        let marker = self.config.marker_index(sr);
        let start = marker + (self.config.tmin * sr).round() as isize;
        let available = window.sample_count();

        let supplied = if start < 0 {
            0
        } else {
            available.saturating_sub(start as usize)
        };
        if expected == 0 || start < 0 || supplied < expected {
            tracing::warn!(
                expected,
                actual = supplied,
                window = available,
                trial = meta.trial_id,
                "epoch window cannot be filled"
            );
            return Err(EpochError::Malformed {
                expected,
                actual: supplied.min(expected),
            });
        }
        let start = start as usize;

        let cascade = Cascade::butterworth_bandpass(
            self.config.filter_order,
            sr,
            self.config.l_freq,
            self.config.h_freq,
        )?
        .chain(Cascade::notch(
            sr,
            self.config.notch_freq,
            self.config.notch_width,
        )?);

        let data: Vec<Vec<f64>> = window
            .data
            .iter()
            .map(|channel| {
                let filtered = cascade.filtfilt(channel);
                filtered[start..start + expected].to_vec()
            })
            .collect();

        let label = Side::from_position(target_x, screen_width);
        let tmin = (start as isize - marker) as f64 / sr;
        tracing::debug!(trial = meta.trial_id, ?label, samples = expected, "epoch built");

        Ok(Epoch::new(
            data,
            sr,
            window.layout,
            tmin,
            marker.max(0) as usize,
            label,
            true,
            meta,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchard_core::ChannelLayout;

    fn window(seconds: f64, sample_rate: f64) -> SampleWindow {
        let n = (seconds * sample_rate) as usize;
        let layout = ChannelLayout::Four;
        let data = (0..layout.channel_count())
            .map(|ch| {
                (0..n)
                    .map(|i| {
                        let t = i as f64 / sample_rate;
                        (ch as f64 + 1.0) * (std::f64::consts::TAU * 10.0 * t).sin()
                    })
                    .collect()
            })
            .collect();
        SampleWindow {
            data,
            timestamps: (0..n).map(|i| i as f64 / sample_rate).collect(),
            sample_rate,
            layout,
        }
    }

    fn meta() -> EpochMeta {
        EpochMeta {
            session_id: "test".into(),
            trial_id: 3,
        }
    }

    #[test]
    fn default_window_has_fixed_length() {
        let builder = EpochBuilder::new(EpochConfig::default());
        let epoch = builder.build(&window(6.0, 250.0), 1200.0, 1900.0, meta()).unwrap();
        assert_eq!(epoch.sample_count(), 1488);
        assert_eq!(epoch.marker_index(), 749);
        assert_eq!(epoch.label(), Side::Right);
        assert!(epoch.has_average_reference());
        assert!((epoch.tmin() - (-2.952)).abs() < 1e-9);
    }

    #[test]
    fn label_follows_screen_center() {
        let builder = EpochBuilder::new(EpochConfig::default());
        let w = window(6.0, 250.0);
        let left = builder.build(&w, 950.0, 1900.0, meta()).unwrap();
        assert_eq!(left.label(), Side::Left);
    }

    #[test]
    fn short_window_is_malformed() {
        let builder = EpochBuilder::new(EpochConfig::default());
        let err = builder.build(&window(4.0, 250.0), 0.0, 1900.0, meta()).unwrap_err();
        assert_eq!(
            err,
            EpochError::Malformed {
                expected: 1488,
                actual: 989,
            }
        );

        let empty = SampleWindow::empty(ChannelLayout::Four, 250.0);
        assert!(matches!(
            builder.build(&empty, 0.0, 1900.0, meta()),
            Err(EpochError::Malformed { actual: 0, .. })
        ));
    }

    #[test]
    fn cutoff_above_nyquist_is_a_filter_error() {
        let builder = EpochBuilder::new(EpochConfig::default());
        let err = builder.build(&window(6.0, 90.0), 0.0, 1900.0, meta()).unwrap_err();
        assert!(matches!(err, EpochError::Signal(_)));
    }

    #[test]
    fn projected_epoch_is_average_referenced() {
        let builder = EpochBuilder::new(EpochConfig::default());
        let epoch = builder.build(&window(6.0, 250.0), 0.0, 1900.0, meta()).unwrap();
        let projected = epoch.projected();
        for t in (0..epoch.sample_count()).step_by(97) {
            let sum: f64 = projected.iter().map(|ch| ch[t]).sum();
            assert!(sum.abs() < 1e-9);
        }
    }
}
