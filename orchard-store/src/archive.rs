use crate::error::{StoreError, StoreResult};
use orchard_core::{Epoch, FeatureVector};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ARCHIVE_FORMAT: u32 = 1;

/// All epochs recorded in one session, in trial order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochArchive {
    pub format: u32,
    pub epochs: Vec<Epoch>,
}

impl EpochArchive {
    pub fn new(epochs: Vec<Epoch>) -> Self {
        Self {
            format: ARCHIVE_FORMAT,
            epochs,
        }
    }

    pub fn labels(&self) -> Vec<u8> {
        self.epochs.iter().map(|e| e.label().label()).collect()
    }

    pub(crate) fn check(self, path: &Path) -> StoreResult<Self> {
        check_format(self.format, path)?;
        Ok(self)
    }
}

/// Stacked feature vectors, one row per epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureArchive {
    pub format: u32,
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>,
}

impl FeatureArchive {
    pub fn from_vectors(vectors: &[FeatureVector]) -> StoreResult<Self> {
        let cols = vectors.first().map_or(0, FeatureVector::len);
        for (row, v) in vectors.iter().enumerate() {
            if v.len() != cols {
                return Err(StoreError::Ragged {
                    row,
                    len: v.len(),
                    expected: cols,
                });
            }
        }
        Ok(Self {
            format: ARCHIVE_FORMAT,
            rows: vectors.len(),
            cols,
            data: vectors.iter().map(|v| v.0.clone()).collect(),
        })
    }

    pub(crate) fn check(self, path: &Path) -> StoreResult<Self> {
        check_format(self.format, path)?;
        for (row, values) in self.data.iter().enumerate() {
            if values.len() != self.cols {
                return Err(StoreError::Ragged {
                    row,
                    len: values.len(),
                    expected: self.cols,
                });
            }
        }
        Ok(self)
    }
}

fn check_format(found: u32, path: &Path) -> StoreResult<()> {
    if found == ARCHIVE_FORMAT {
        Ok(())
    } else {
        Err(StoreError::Format {
            path: path.to_path_buf(),
            found,
        })
    }
}
