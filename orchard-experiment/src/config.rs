use orchard_core::SessionMode;
use orchard_signal::{EpochConfig, FeatureConfig, SourceModelOptions};
use orchard_stream::CorrectionOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Trial phases, in seconds, and the loop rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub before_marker_secs: f64,
    pub marker_secs: f64,
    pub after_marker_secs: f64,
    /// Wait after the marker ends before the decision is taken.
    pub settle_secs: f64,
    pub fps: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            before_marker_secs: 3.0,
            marker_secs: 3.0,
            after_marker_secs: 3.0,
            settle_secs: 0.5,
            fps: 30,
        }
    }
}

impl TimingConfig {
    /// Full trial length; the target needs exactly this long to cross the
    /// screen.
    pub fn total_secs(&self) -> f64 {
        self.before_marker_secs + self.marker_secs + self.after_marker_secs
    }

    /// Span of samples pulled for one decision.
    pub fn window_secs(&self) -> f64 {
        self.before_marker_secs + self.marker_secs
    }

    pub fn window(&self) -> Duration {
        Duration::from_nanos(secs_to_ns(self.window_secs()))
    }

    pub fn decision_threshold_secs(&self) -> f64 {
        self.window_secs() + self.settle_secs
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.fps.max(1)))
    }
}

pub(crate) fn secs_to_ns(secs: f64) -> u64 {
    // Saturating cast: negative and NaN become zero.
    (secs * 1e9) as u64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub name: String,
    pub resolve_timeout_secs: f64,
    pub reorder: bool,
    pub dejitter: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: "Explore_8547_ExG".to_string(),
            resolve_timeout_secs: 5.0,
            reorder: true,
            dejitter: true,
        }
    }
}

impl StreamConfig {
    pub fn correction(&self) -> CorrectionOptions {
        CorrectionOptions {
            reorder: self.reorder,
            dejitter: self.dejitter,
        }
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_nanos(secs_to_ns(self.resolve_timeout_secs))
    }
}

/// Playfield dimensions in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub screen_width: f32,
    pub screen_height: f32,
    pub player_width: f32,
    pub player_height: f32,
    pub apple_size: f32,
    pub load_bar_height: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        // 1000 × 750 reference layout scaled by 1.9.
        Self {
            screen_width: 1900.0,
            screen_height: 1425.0,
            player_width: 380.0,
            player_height: 380.0,
            apple_size: 190.0,
            load_bar_height: 95.0,
        }
    }
}

/// Filtering of the raw window. Epoch bounds default to the marker-aligned
/// span derived from the timing section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub l_freq: f64,
    pub h_freq: f64,
    pub notch_freq: f64,
    pub notch_width: f64,
    pub filter_order: usize,
    pub tmin: Option<f64>,
    pub tmax: Option<f64>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        let epoch = EpochConfig::default();
        Self {
            l_freq: epoch.l_freq,
            h_freq: epoch.h_freq,
            notch_freq: epoch.notch_freq,
            notch_width: epoch.notch_width,
            filter_order: epoch.filter_order,
            tmin: None,
            tmax: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
        }
    }
}

/// Everything a session needs, fixed at construction and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub subject: u32,
    pub mode: SessionMode,
    /// Session ends once catches plus misses reach this count.
    pub trials: usize,
    pub timing: TimingConfig,
    pub stream: StreamConfig,
    pub geometry: GeometryConfig,
    pub preprocessing: PreprocessingConfig,
    pub features: FeatureConfig,
    pub source_model: SourceModelOptions,
    pub storage: StorageConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            subject: 1,
            mode: SessionMode::default(),
            trials: 20,
            timing: TimingConfig::default(),
            stream: StreamConfig::default(),
            geometry: GeometryConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            features: FeatureConfig::default(),
            source_model: SourceModelOptions::default(),
            storage: StorageConfig::default(),
        }
    }
}

fn is_band(low: f64, high: f64) -> bool {
    low > 0.0 && low < high
}

impl ExperimentConfig {
    pub fn new(subject: u32, mode: SessionMode) -> Self {
        Self {
            subject,
            mode,
            ..Self::default()
        }
    }

    /// Reads a JSON config. Absent fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        for (name, value) in [
            ("timing.before_marker_secs", t.before_marker_secs),
            ("timing.marker_secs", t.marker_secs),
            ("timing.after_marker_secs", t.after_marker_secs),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if t.settle_secs.is_nan() || t.settle_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "timing.settle_secs must not be negative, got {}",
                t.settle_secs
            )));
        }
        if t.fps == 0 {
            return Err(ConfigError::Invalid("timing.fps must be positive".into()));
        }
        if t.decision_threshold_secs() >= t.total_secs() {
            return Err(ConfigError::Invalid(
                "the decision must fall before the end of the trial".into(),
            ));
        }
        if self.trials == 0 {
            return Err(ConfigError::Invalid("trials must be positive".into()));
        }
        if self.trials % 2 != 0 {
            tracing::warn!(
                trials = self.trials,
                "odd trial count; the target sequence holds {} of each side",
                self.trials / 2
            );
        }

        let g = &self.geometry;
        if g.screen_width <= 0.0 || g.screen_height <= g.player_height {
            return Err(ConfigError::Invalid("playfield is smaller than the player".into()));
        }

        let p = &self.preprocessing;
        if !is_band(p.l_freq, p.h_freq) {
            return Err(ConfigError::Invalid(format!(
                "preprocessing band {}–{} Hz is inverted or empty",
                p.l_freq, p.h_freq
            )));
        }
        if self.features.bands.is_empty() {
            return Err(ConfigError::Invalid("features.bands is empty".into()));
        }
        if let Some((low, high)) = self
            .features
            .bands
            .iter()
            .find(|(low, high)| !is_band(*low, *high))
        {
            return Err(ConfigError::Invalid(format!(
                "feature band {low}–{high} Hz is inverted or empty"
            )));
        }
        let (crop_min, crop_max) = self.features.crop;
        if crop_min >= crop_max {
            return Err(ConfigError::Invalid("features.crop is empty".into()));
        }
        // Exact bounds depend on the sampling rate and are checked again once
        // the stream is open.
        let epoch = self.epoch_config();
        if crop_min < epoch.tmin || crop_max >= epoch.tmax {
            return Err(ConfigError::Invalid(format!(
                "features.crop [{crop_min}, {crop_max}] s lies outside the epoch [{}, {}) s",
                epoch.tmin, epoch.tmax
            )));
        }
        if self.source_model.n_sources == 0 {
            return Err(ConfigError::Invalid("source_model.n_sources must be positive".into()));
        }
        Ok(())
    }

    /// Epoch bounds follow the timing section unless overridden.
    pub fn epoch_config(&self) -> EpochConfig {
        let aligned =
            EpochConfig::aligned(self.timing.before_marker_secs, self.timing.marker_secs);
        let p = &self.preprocessing;
        EpochConfig {
            l_freq: p.l_freq,
            h_freq: p.h_freq,
            notch_freq: p.notch_freq,
            notch_width: p.notch_width,
            filter_order: p.filter_order,
            tmin: p.tmin.unwrap_or(aligned.tmin),
            tmax: p.tmax.unwrap_or(aligned.tmax),
            ..aligned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_protocol() {
        let config = ExperimentConfig::new(1, SessionMode::Training);
        assert_eq!(config.trials, 20);
        assert_eq!(config.timing.total_secs(), 9.0);
        assert_eq!(config.timing.window(), Duration::from_secs(6));
        assert_eq!(config.stream.name, "Explore_8547_ExG");
        assert_eq!(config.geometry.screen_height, 1425.0);
        config.validate().unwrap();

        let epoch = config.epoch_config();
        assert_eq!(epoch.before_marker_secs, 3.0);
        assert!((epoch.tmin + 2.95).abs() < 1e-12);
        assert_eq!(epoch.tmax, 3.0);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "subject": 4, "mode": "define", "timing": {{ "fps": 60 }}, "preprocessing": {{ "tmin": -1.0 }} }}"#
        )
        .unwrap();
        let config = ExperimentConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.subject, 4);
        assert_eq!(config.mode, SessionMode::Define);
        assert_eq!(config.timing.fps, 60);
        assert_eq!(config.timing.marker_secs, 3.0);
        assert_eq!(config.epoch_config().tmin, -1.0);
        assert_eq!(config.features.bands, vec![(7.0, 11.0), (9.0, 13.0)]);
    }

    #[test]
    fn rejects_broken_values() {
        let mut config = ExperimentConfig::new(1, SessionMode::Test);
        config.features.bands = vec![(13.0, 9.0)];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ExperimentConfig::new(1, SessionMode::Test);
        config.timing.settle_secs = 4.0;
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::new(1, SessionMode::Test);
        config.timing.fps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn crop_must_fit_inside_the_epoch() {
        let mut config = ExperimentConfig::new(1, SessionMode::Training);
        config.preprocessing.tmax = Some(1.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("features.crop")));

        config.features.crop = (-0.1, 0.9);
        config.validate().unwrap();

        config.preprocessing.tmin = Some(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let err = ExperimentConfig::from_json_file("/nonexistent/orchard.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
