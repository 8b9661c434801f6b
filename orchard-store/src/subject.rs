use crate::archive::{EpochArchive, FeatureArchive};
use crate::error::{StoreError, StoreResult};
use crate::results::TestResult;
use chrono::{DateTime, Local};
use orchard_core::{Epoch, FeatureVector};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const EPOCH_SUFFIX: &str = "_epo.json";
const FEATURE_SUFFIX: &str = "_features.json";
const RESULTS_FILE: &str = "test_results.json";

/// Session file prefix, e.g. `2026-10-14_1530`.
pub fn session_stamp(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d_%H%M").to_string()
}

/// Matched archives of one recorded session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPair {
    pub epochs: PathBuf,
    pub features: PathBuf,
}

/// Files of one subject under `<root>/sNN`. The directory is created the
/// first time something is written.
#[derive(Debug, Clone)]
pub struct SubjectStore {
    dir: PathBuf,
    subject: u32,
}

impl SubjectStore {
    pub fn new(root: impl AsRef<Path>, subject: u32) -> Self {
        Self {
            dir: root.as_ref().join(format!("s{subject:02}")),
            subject,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn subject(&self) -> u32 {
        self.subject
    }

    pub fn epoch_path(&self, stamp: &str) -> PathBuf {
        self.dir.join(format!("{stamp}{EPOCH_SUFFIX}"))
    }

    pub fn feature_path(&self, stamp: &str) -> PathBuf {
        self.dir.join(format!("{stamp}{FEATURE_SUFFIX}"))
    }

    pub fn results_path(&self) -> PathBuf {
        self.dir.join(RESULTS_FILE)
    }

    /// `stamp` if neither archive exists under it, otherwise the first free
    /// `stamp_2`, `stamp_3`, … Both archives of a session share the result.
    pub fn unused_stamp(&self, stamp: &str) -> String {
        let taken = |s: &str| self.epoch_path(s).exists() || self.feature_path(s).exists();
        if !taken(stamp) {
            return stamp.to_string();
        }
        (2..)
            .map(|n| format!("{stamp}_{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| stamp.to_string())
    }

    /// Fails with [`StoreError::Io`] if the archive already exists.
    pub fn save_epochs(&self, stamp: &str, epochs: &[Epoch]) -> StoreResult<PathBuf> {
        let path = self.epoch_path(stamp);
        self.write_json(&path, &EpochArchive::new(epochs.to_vec()), false)?;
        tracing::info!(path = %path.display(), count = epochs.len(), "epochs saved");
        Ok(path)
    }

    /// Fails with [`StoreError::Io`] if the archive already exists.
    pub fn save_features(&self, stamp: &str, features: &[FeatureVector]) -> StoreResult<PathBuf> {
        let path = self.feature_path(stamp);
        self.write_json(&path, &FeatureArchive::from_vectors(features)?, false)?;
        tracing::info!(path = %path.display(), rows = features.len(), "features saved");
        Ok(path)
    }

    pub fn load_epochs(&self, path: &Path) -> StoreResult<EpochArchive> {
        read_json::<EpochArchive>(path)?.check(path)
    }

    pub fn load_features(&self, path: &Path) -> StoreResult<FeatureArchive> {
        read_json::<FeatureArchive>(path)?.check(path)
    }

    /// Epoch and feature archives, each sorted by name and paired in order.
    /// A missing directory yields no pairs; unequal counts are an error.
    pub fn training_pairs(&self) -> StoreResult<Vec<TrainingPair>> {
        let mut epochs = self.list(EPOCH_SUFFIX)?;
        let mut features = self.list(FEATURE_SUFFIX)?;
        if epochs.len() != features.len() {
            return Err(StoreError::ArchiveMismatch {
                epochs: epochs.len(),
                features: features.len(),
            });
        }
        epochs.sort();
        features.sort();
        Ok(epochs
            .into_iter()
            .zip(features)
            .map(|(epochs, features)| TrainingPair { epochs, features })
            .collect())
    }

    /// Previous results keyed `test_1`, `test_2`, … An unreadable or
    /// corrupted file counts as empty.
    pub fn load_results(&self) -> BTreeMap<String, serde_json::Value> {
        let path = self.results_path();
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), %err, "results store is corrupted; starting fresh");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }

    /// Adds `result` under the next free `test_N` key and returns the key.
    pub fn append_result(&self, result: &TestResult) -> StoreResult<String> {
        let mut results = self.load_results();
        let key = format!("test_{}", results.len() + 1);
        results.insert(key.clone(), serde_json::to_value(result)?);
        self.write_json(&self.results_path(), &results, true)?;
        tracing::info!(key = %key, path = %self.results_path().display(), "results saved");
        Ok(key)
    }

    fn list(&self, suffix: &str) -> StoreResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.dir, err)),
        };
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.dir, e))?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(suffix));
            if matches && path.is_file() {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Serializes into a temporary file next to `path`, then renames it into
    /// place. Without `replace` an existing `path` is an error.
    fn write_json<T: Serialize>(&self, path: &Path, value: &T, replace: bool) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let bytes = serde_json::to_vec_pretty(value)?;
        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        tmp.write_all(&bytes).map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        let persisted = if replace {
            tmp.persist(path)
        } else {
            tmp.persist_noclobber(path)
        };
        persisted.map_err(|e| StoreError::io(path, e.error))?;
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
