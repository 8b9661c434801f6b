//! Spherical-head source model and sLORETA inverse kernel.
//!
//! Building the model is the expensive part of the pipeline; the result is a
//! plain `n_sources × n_channels` matrix that every trial reuses.

use crate::error::{SignalError, SignalResult};
use nalgebra::{DMatrix, DVector, Vector3};
use orchard_core::ChannelLayout;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceModelOptions {
    pub n_sources: usize,
    /// Radius of the source shell as a fraction of the head radius.
    pub source_radius: f64,
    pub head_radius_m: f64,
    /// Conductivity of the homogeneous medium, in S/m.
    pub conductivity: f64,
    /// Per-channel noise standard deviation, in volts.
    pub noise_std: f64,
    pub depth: f64,
    pub snr: f64,
}

impl Default for SourceModelOptions {
    fn default() -> Self {
        Self {
            n_sources: 256,
            source_radius: 0.75,
            head_radius_m: 0.09,
            conductivity: 0.33,
            noise_std: 0.2e-6,
            depth: 0.8,
            snr: 3.0,
        }
    }
}

/// Electrode and dipole positions in head coordinates (meters).
#[derive(Debug, Clone)]
pub struct HeadGeometry {
    pub electrodes: Vec<Vector3<f64>>,
    pub sources: Vec<Vector3<f64>>,
}

impl HeadGeometry {
    /// Electrodes at their 10-10 positions on the scalp sphere; sources on a
    /// Fibonacci lattice over the upper half of the inner shell.
    pub fn spherical(layout: ChannelLayout, options: &SourceModelOptions) -> Self {
        let r = options.head_radius_m;
        let electrodes = layout
            .positions()
            .into_iter()
            .map(|p| Vector3::new(p[0], p[1], p[2]) * r)
            .collect();

        let n = options.n_sources.max(1);
        let golden = PI * (3.0 - 5f64.sqrt());
        let shell = r * options.source_radius;
        let sources = (0..n)
            .map(|i| {
                let z = 1.0 - (i as f64 + 0.5) / n as f64;
                let ring = (1.0 - z * z).sqrt();
                let phi = golden * i as f64;
                Vector3::new(ring * phi.cos(), ring * phi.sin(), z) * shell
            })
            .collect();

        Self {
            electrodes,
            sources,
        }
    }
}

/// Diagonal sensor noise covariance.
#[derive(Debug, Clone)]
pub struct NoiseCovariance {
    variances: DVector<f64>,
}

impl NoiseCovariance {
    pub fn ad_hoc(n_channels: usize, std: f64) -> Self {
        Self {
            variances: DVector::from_element(n_channels, std * std),
        }
    }

    /// `C^{-1/2}` as a diagonal.
    fn whitener(&self) -> DVector<f64> {
        self.variances.map(|v| 1.0 / v.sqrt())
    }
}

/// Average-referenced gain of radial dipoles in an infinite homogeneous
/// conductor.
#[derive(Debug, Clone)]
pub struct ForwardSolution {
    gain: DMatrix<f64>,
}

impl ForwardSolution {
    pub fn compute(geometry: &HeadGeometry, conductivity: f64) -> Self {
        let n_ch = geometry.electrodes.len();
        let n_src = geometry.sources.len();
        let k = 1.0 / (4.0 * PI * conductivity);

        let mut gain = DMatrix::from_fn(n_ch, n_src, |c, s| {
            let src = geometry.sources[s];
            let orientation = src.normalize();
            let d = geometry.electrodes[c] - src;
            let dist = d.norm();
            k * orientation.dot(&d) / (dist * dist * dist)
        });

        for mut column in gain.column_iter_mut() {
            let mean = column.mean();
            column.add_scalar_mut(-mean);
        }
        Self { gain }
    }

    pub fn gain(&self) -> &DMatrix<f64> {
        &self.gain
    }
}

/// Immutable per-subject inverse operator.
#[derive(Debug, Clone)]
pub struct SourceModel {
    layout: ChannelLayout,
    kernel: DMatrix<f64>,
    forward: ForwardSolution,
}

impl SourceModel {
    pub fn build(layout: ChannelLayout, options: &SourceModelOptions) -> SignalResult<Self> {
        let geometry = HeadGeometry::spherical(layout, options);
        let forward = ForwardSolution::compute(&geometry, options.conductivity);
        let noise = NoiseCovariance::ad_hoc(layout.channel_count(), options.noise_std);
        let kernel = inverse_kernel(&forward, &noise, options.depth, options.snr)?;
        tracing::info!(
            ?layout,
            sources = kernel.nrows(),
            channels = kernel.ncols(),
            "source model built"
        );
        Ok(Self {
            layout,
            kernel,
            forward,
        })
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn n_sources(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn kernel(&self) -> &DMatrix<f64> {
        &self.kernel
    }

    pub fn forward(&self) -> &ForwardSolution {
        &self.forward
    }

    /// Per-source time series for a channel-major data matrix.
    pub fn apply(&self, data: &[Vec<f64>]) -> SignalResult<DMatrix<f64>> {
        if data.len() != self.kernel.ncols() {
            return Err(SignalError::ChannelCount {
                expected: self.kernel.ncols(),
                actual: data.len(),
            });
        }
        let n_t = data.first().map_or(0, Vec::len);
        let sensors = DMatrix::from_fn(data.len(), n_t, |c, t| data[c][t]);
        Ok(&self.kernel * sensors)
    }

    /// Mean squared amplitude of every source over time.
    pub fn source_power(&self, data: &[Vec<f64>]) -> SignalResult<Vec<f64>> {
        let sources = self.apply(data)?;
        let n_t = sources.ncols();
        if n_t == 0 {
            return Err(SignalError::EmptyCrop);
        }
        Ok(sources
            .row_iter()
            .map(|row| row.iter().map(|v| v * v).sum::<f64>() / n_t as f64)
            .collect())
    }
}

/// Depth-weighted minimum-norm kernel on the whitened gain, followed by
/// sLORETA normalization of every source row.
fn inverse_kernel(
    forward: &ForwardSolution,
    noise: &NoiseCovariance,
    depth: f64,
    snr: f64,
) -> SignalResult<DMatrix<f64>> {
    let w = noise.whitener();
    let mut g = forward.gain().clone();
    for (mut row, scale) in g.row_iter_mut().zip(w.iter()) {
        row *= *scale;
    }
    let n_ch = g.nrows();

    let mut prior: DVector<f64> = DVector::from_iterator(
        g.ncols(),
        g.column_iter().map(|col| col.norm_squared().powf(-depth)),
    );
    if prior.iter().any(|p| !p.is_finite()) {
        return Err(SignalError::Singular("source with zero gain"));
    }

    // Scale the prior so trace(G R Gᵀ) / n_channels = 1.
    let g_r = scale_columns(&g, &prior);
    let trace = (&g_r * g.transpose()).trace();
    if trace.is_nan() || trace <= 0.0 {
        return Err(SignalError::Singular("zero gain trace"));
    }
    prior /= trace / n_ch as f64;
    let g_r = scale_columns(&g, &prior);

    let lambda2 = 1.0 / (snr * snr);
    let mut gram = &g_r * g.transpose();
    for i in 0..n_ch {
        gram[(i, i)] += lambda2;
    }
    let inverse = gram
        .cholesky()
        .ok_or(SignalError::Singular("regularized gram matrix"))?
        .inverse();

    // K = R Gᵀ M, then row i divided by sqrt(r_i · g_iᵀ M g_i).
    let mut kernel = g_r.transpose() * &inverse;
    for (i, mut row) in kernel.row_iter_mut().enumerate() {
        let g_i = g.column(i);
        let norm = (prior[i] * (g_i.transpose() * &inverse * g_i)[(0, 0)]).sqrt();
        if norm > 0.0 {
            row /= norm;
        }
    }

    for (mut column, scale) in kernel.column_iter_mut().zip(w.iter()) {
        column *= *scale;
    }
    Ok(kernel)
}

fn scale_columns(m: &DMatrix<f64>, scales: &DVector<f64>) -> DMatrix<f64> {
    let mut out = m.clone();
    for (mut column, s) in out.column_iter_mut().zip(scales.iter()) {
        column *= *s;
    }
    out
}
