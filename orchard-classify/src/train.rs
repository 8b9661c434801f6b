use crate::classifier::LearnedClassifier;
use crate::error::TrainError;
use crate::pipeline::LinearPipeline;
use nalgebra::DMatrix;
use orchard_core::ChannelLayout;
use orchard_store::SubjectStore;

/// A fitted classifier and the recording geometry it was trained on.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub classifier: LearnedClassifier,
    pub layout: ChannelLayout,
    pub sample_rate: f64,
    pub n_epochs: usize,
}

/// Fits the learned pipeline on every archived session of a subject.
///
/// Epoch and feature archives are matched by sorted name. No archives is
/// [`TrainError::NoTrainingData`]; unequal archive counts are
/// [`TrainError::Mismatch`].
pub fn train(store: &SubjectStore) -> Result<TrainedModel, TrainError> {
    let pairs = store.training_pairs()?;
    if pairs.is_empty() {
        tracing::warn!(subject = store.subject(), "no training data available");
        return Err(TrainError::NoTrainingData);
    }

    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut labels: Vec<u8> = Vec::new();
    let mut geometry: Option<(ChannelLayout, f64)> = None;
    let mut cols: Option<usize> = None;

    for pair in &pairs {
        tracing::info!(
            epochs = %pair.epochs.display(),
            features = %pair.features.display(),
            "loading training session"
        );
        let epochs = store.load_epochs(&pair.epochs)?;
        let features = store.load_features(&pair.features)?;

        if features.rows != epochs.epochs.len() || features.data.len() != features.rows {
            return Err(TrainError::ShapeMismatch(format!(
                "{} holds {} feature rows for {} epochs",
                pair.features.display(),
                features.data.len(),
                epochs.epochs.len()
            )));
        }
        if features.rows > 0 {
            match cols {
                Some(expected) if expected != features.cols => {
                    return Err(TrainError::ShapeMismatch(format!(
                        "feature length {} in {} differs from {}",
                        features.cols,
                        pair.features.display(),
                        expected
                    )));
                }
                _ => cols = Some(features.cols),
            }
        }

        for epoch in &epochs.epochs {
            let this = (epoch.layout(), epoch.sample_rate());
            match geometry {
                Some(first) if first != this => {
                    return Err(TrainError::ShapeMismatch(format!(
                        "epochs recorded with {:?} at {} Hz and {:?} at {} Hz",
                        first.0, first.1, this.0, this.1
                    )));
                }
                _ => geometry = Some(this),
            }
        }

        labels.extend(epochs.labels());
        rows.extend(features.data);
    }

    let (layout, sample_rate) = geometry.ok_or(TrainError::NoTrainingData)?;
    let n_cols = cols.unwrap_or(0);
    if rows.is_empty() || n_cols == 0 {
        return Err(TrainError::NoTrainingData);
    }

    let x = DMatrix::from_fn(rows.len(), n_cols, |r, c| rows[r][c]);
    tracing::info!(
        samples = x.nrows(),
        features = x.ncols(),
        sessions = pairs.len(),
        "fitting classifier"
    );
    let pipeline = LinearPipeline::fit(&x, &labels)?;
    Ok(TrainedModel {
        classifier: LearnedClassifier::new(pipeline),
        layout,
        sample_rate,
        n_epochs: rows.len(),
    })
}
