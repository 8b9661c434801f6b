//! Standardize, project onto principal components, then a two-class linear
//! discriminant.

use crate::error::TrainError;
use nalgebra::{DMatrix, DVector};

/// Per-feature z-scoring with population standard deviation.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: DVector<f64>,
    scale: DVector<f64>,
}

impl StandardScaler {
    pub fn fit(x: &DMatrix<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mean = DVector::from_iterator(x.ncols(), x.column_iter().map(|c| c.sum() / n));
        let scale = DVector::from_iterator(
            x.ncols(),
            x.column_iter().zip(mean.iter()).map(|(c, m)| {
                let var = c.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
                // Constant features pass through unscaled.
                if var > 0.0 { var.sqrt() } else { 1.0 }
            }),
        );
        Self { mean, scale }
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = x.clone();
        for (j, mut column) in out.column_iter_mut().enumerate() {
            column.add_scalar_mut(-self.mean[j]);
            column /= self.scale[j];
        }
        out
    }

    pub fn transform_row(&self, row: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            row.len(),
            row.iter()
                .zip(self.mean.iter().zip(self.scale.iter()))
                .map(|(v, (m, s))| (v - m) / s),
        )
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

/// Principal components retaining a fraction of the variance.
#[derive(Debug, Clone)]
pub struct Pca {
    mean: DVector<f64>,
    /// `k × p`, one component per row.
    components: DMatrix<f64>,
    explained: Vec<f64>,
}

impl Pca {
    /// Keeps the smallest number of components whose cumulative explained
    /// variance ratio reaches `variance`.
    pub fn fit(x: &DMatrix<f64>, variance: f64) -> Result<Self, TrainError> {
        let n = x.nrows();
        if n < 2 {
            return Err(TrainError::Degenerate("PCA needs at least two samples"));
        }
        let mean = DVector::from_iterator(
            x.ncols(),
            x.column_iter().map(|c| c.sum() / n as f64),
        );
        let mut centered = x.clone();
        for (j, mut column) in centered.column_iter_mut().enumerate() {
            column.add_scalar_mut(-mean[j]);
        }

        let svd = centered.svd(false, true);
        let v_t = svd
            .v_t
            .ok_or(TrainError::Degenerate("SVD did not produce components"))?;
        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

        let energy: Vec<f64> = order
            .iter()
            .map(|&i| svd.singular_values[i] * svd.singular_values[i])
            .collect();
        let total: f64 = energy.iter().sum();
        if total <= 0.0 {
            return Err(TrainError::Degenerate("features have no variance"));
        }

        let mut keep = 0;
        let mut cumulative = 0.0;
        for e in &energy {
            keep += 1;
            cumulative += e / total;
            if cumulative >= variance {
                break;
            }
        }

        let components = DMatrix::from_fn(keep, x.ncols(), |r, c| v_t[(order[r], c)]);
        let explained = energy[..keep].iter().map(|e| e / total).collect();
        Ok(Self {
            mean,
            components,
            explained,
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn explained_variance_ratio(&self) -> &[f64] {
        &self.explained
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let mut centered = x.clone();
        for (j, mut column) in centered.column_iter_mut().enumerate() {
            column.add_scalar_mut(-self.mean[j]);
        }
        centered * self.components.transpose()
    }

    pub fn transform_vector(&self, v: &DVector<f64>) -> DVector<f64> {
        &self.components * (v - &self.mean)
    }
}

/// Two-class LDA with a pooled, ridge-regularized covariance.
#[derive(Debug, Clone)]
pub struct Lda {
    weights: DVector<f64>,
    bias: f64,
}

const RIDGE: f64 = 1e-3;

impl Lda {
    /// `y` holds labels 0 and 1; both must be present.
    pub fn fit(z: &DMatrix<f64>, y: &[u8]) -> Result<Self, TrainError> {
        let k = z.ncols();
        let rows = |label: u8| -> Vec<usize> {
            y.iter()
                .enumerate()
                .filter(|(_, l)| **l == label)
                .map(|(i, _)| i)
                .collect()
        };
        let (zero, one) = (rows(0), rows(1));
        if zero.is_empty() || one.is_empty() {
            return Err(TrainError::SingleClass);
        }

        let class_mean = |idx: &[usize]| -> DVector<f64> {
            let mut m = DVector::zeros(k);
            for &i in idx {
                m += z.row(i).transpose();
            }
            m / idx.len() as f64
        };
        let (m0, m1) = (class_mean(&zero), class_mean(&one));

        let mut cov = DMatrix::zeros(k, k);
        for (idx, m) in [(&zero, &m0), (&one, &m1)] {
            for &i in idx.iter() {
                let d = z.row(i).transpose() - m;
                cov += &d * d.transpose();
            }
        }
        cov /= (y.len().saturating_sub(2)).max(1) as f64;
        let shrink = RIDGE * (cov.trace() / k.max(1) as f64) + 1e-12;
        for i in 0..k {
            cov[(i, i)] += shrink;
        }

        let diff = &m1 - &m0;
        let weights = cov
            .cholesky()
            .ok_or(TrainError::Degenerate("pooled covariance is not positive definite"))?
            .solve(&diff);
        let midpoint = (&m0 + &m1) / 2.0;
        let prior = (one.len() as f64 / zero.len() as f64).ln();
        let bias = -weights.dot(&midpoint) + prior;
        Ok(Self { weights, bias })
    }

    /// Signed distance toward class 1.
    pub fn score(&self, z: &DVector<f64>) -> f64 {
        self.weights.dot(z) + self.bias
    }
}

/// The fitted scaler → PCA → LDA chain.
#[derive(Debug, Clone)]
pub struct LinearPipeline {
    scaler: StandardScaler,
    pca: Pca,
    lda: Lda,
}

pub const RETAINED_VARIANCE: f64 = 0.95;

impl LinearPipeline {
    pub fn fit(x: &DMatrix<f64>, y: &[u8]) -> Result<Self, TrainError> {
        if x.nrows() != y.len() {
            return Err(TrainError::ShapeMismatch(format!(
                "{} feature rows for {} labels",
                x.nrows(),
                y.len()
            )));
        }
        let scaler = StandardScaler::fit(x);
        let scaled = scaler.transform(x);
        let pca = Pca::fit(&scaled, RETAINED_VARIANCE)?;
        let projected = pca.transform(&scaled);
        let lda = Lda::fit(&projected, y)?;
        tracing::debug!(
            features = x.ncols(),
            components = pca.n_components(),
            samples = x.nrows(),
            "pipeline fitted"
        );
        Ok(Self { scaler, pca, lda })
    }

    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    pub fn pca(&self) -> &Pca {
        &self.pca
    }

    pub fn decision_function(&self, features: &[f64]) -> f64 {
        let scaled = self.scaler.transform_row(features);
        self.lda.score(&self.pca.transform_vector(&scaled))
    }

    /// Probability-like confidence of class 1.
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        1.0 / (1.0 + (-self.decision_function(features)).exp())
    }
}
