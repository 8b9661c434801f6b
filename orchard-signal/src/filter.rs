//! Biquad cascades and forward-backward (zero-phase) application.

use crate::error::{SignalError, SignalResult};
use std::f64::consts::PI;

/// Second-order section, normalized so `a0 = 1`:
///
/// `y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    pub fn lowpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let (cos_w, alpha) = omega(sample_rate, cutoff, q);
        let b0 = (1.0 - cos_w) / 2.0;
        Self::normalized(b0, 1.0 - cos_w, b0, 1.0 + alpha, -2.0 * cos_w, 1.0 - alpha)
    }

    pub fn highpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let (cos_w, alpha) = omega(sample_rate, cutoff, q);
        let b0 = (1.0 + cos_w) / 2.0;
        Self::normalized(b0, -(1.0 + cos_w), b0, 1.0 + alpha, -2.0 * cos_w, 1.0 - alpha)
    }

    pub fn notch(sample_rate: f64, center: f64, q: f64) -> Self {
        let (cos_w, alpha) = omega(sample_rate, center, q);
        Self::normalized(
            1.0,
            -2.0 * cos_w,
            1.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Gain at DC.
    fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            0.0
        } else {
            (self.b0 + self.b1 + self.b2) / den
        }
    }
}

fn omega(sample_rate: f64, frequency: f64, q: f64) -> (f64, f64) {
    let w = 2.0 * PI * frequency / sample_rate;
    (w.cos(), w.sin() / (2.0 * q))
}

fn check_cutoff(sample_rate: f64, cutoff: f64) -> SignalResult<()> {
    if cutoff > 0.0 && cutoff < sample_rate / 2.0 {
        Ok(())
    } else {
        Err(SignalError::Filter {
            cutoff,
            sample_rate,
        })
    }
}

/// Q of each section of an even-order Butterworth prototype.
fn butterworth_qs(order: usize) -> impl Iterator<Item = f64> {
    let n = order.max(2) as f64;
    (1..=order.max(2) / 2).map(move |k| 1.0 / (2.0 * ((2 * k - 1) as f64 * PI / (2.0 * n)).cos()))
}

/// Series of biquads applied in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Cascade {
    sections: Vec<Biquad>,
}

impl Cascade {
    pub fn new(sections: Vec<Biquad>) -> Self {
        Self { sections }
    }

    /// Even-order Butterworth low-pass. Odd orders are rounded down.
    pub fn butterworth_lowpass(order: usize, sample_rate: f64, cutoff: f64) -> SignalResult<Self> {
        check_cutoff(sample_rate, cutoff)?;
        Ok(Self::new(
            butterworth_qs(order)
                .map(|q| Biquad::lowpass(sample_rate, cutoff, q))
                .collect(),
        ))
    }

    pub fn butterworth_highpass(order: usize, sample_rate: f64, cutoff: f64) -> SignalResult<Self> {
        check_cutoff(sample_rate, cutoff)?;
        Ok(Self::new(
            butterworth_qs(order)
                .map(|q| Biquad::highpass(sample_rate, cutoff, q))
                .collect(),
        ))
    }

    /// High-pass at `low` followed by low-pass at `high`.
    pub fn butterworth_bandpass(
        order: usize,
        sample_rate: f64,
        low: f64,
        high: f64,
    ) -> SignalResult<Self> {
        if low.is_nan() || high.is_nan() || low >= high {
            return Err(SignalError::InvalidBand { low, high });
        }
        let mut cascade = Self::butterworth_highpass(order, sample_rate, low)?;
        cascade
            .sections
            .extend(Self::butterworth_lowpass(order, sample_rate, high)?.sections);
        Ok(cascade)
    }

    /// Notch at `center` whose -3 dB width is `width` Hz.
    pub fn notch(sample_rate: f64, center: f64, width: f64) -> SignalResult<Self> {
        check_cutoff(sample_rate, center)?;
        if width.is_nan() || width <= 0.0 {
            return Err(SignalError::InvalidBand {
                low: center - width / 2.0,
                high: center + width / 2.0,
            });
        }
        Ok(Self::new(vec![Biquad::notch(
            sample_rate,
            center,
            center / width,
        )]))
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    pub fn chain(mut self, other: Cascade) -> Self {
        self.sections.extend(other.sections);
        self
    }

    /// Causal pass in place. Each section starts in the steady state of a
    /// constant input equal to its first sample.
    pub fn process(&self, samples: &mut [f64]) {
        let Some(&first) = samples.first() else {
            return;
        };
        let mut level = first;
        for c in &self.sections {
            let out_level = c.dc_gain() * level;
            // [x1, x2, y1, y2]
            let mut s = [level, level, out_level, out_level];
            for sample in samples.iter_mut() {
                let x = *sample;
                let y = c.b0 * x + c.b1 * s[0] + c.b2 * s[1] - c.a1 * s[2] - c.a2 * s[3];
                s[1] = s[0];
                s[0] = x;
                s[3] = s[2];
                s[2] = y;
                *sample = y;
            }
            level = out_level;
        }
    }

    fn pad_len(&self, len: usize) -> usize {
        (3 * (2 * self.sections.len() + 1)).min(len.saturating_sub(1))
    }

    /// Zero-phase filtering: forward pass, backward pass, with odd reflection
    /// of `3 × (2 × sections + 1)` samples at each end.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        if n == 0 || self.sections.is_empty() {
            return input.to_vec();
        }
        let pad = self.pad_len(n);
        let (first, last) = (input[0], input[n - 1]);

        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
        ext.extend_from_slice(input);
        ext.extend((1..=pad).map(|i| 2.0 * last - input[n - 1 - i]));

        self.process(&mut ext);
        ext.reverse();
        self.process(&mut ext);
        ext.reverse();

        ext[pad..pad + n].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn butterworth_sections_have_textbook_qs() {
        let qs: Vec<f64> = butterworth_qs(4).collect();
        assert_eq!(qs.len(), 2);
        assert!((qs[0] - 0.541_196).abs() < 1e-5);
        assert!((qs[1] - 1.306_563).abs() < 1e-5);
    }

    #[test]
    fn rejects_cutoffs_at_or_above_nyquist() {
        assert!(Cascade::butterworth_lowpass(4, 250.0, 125.0).is_err());
        assert!(Cascade::butterworth_highpass(4, 250.0, 0.0).is_err());
        assert!(matches!(
            Cascade::butterworth_bandpass(4, 250.0, 13.0, 9.0),
            Err(SignalError::InvalidBand { .. })
        ));
    }

    #[test]
    fn lowpass_passes_dc() {
        let lp = Cascade::butterworth_lowpass(4, 250.0, 10.0).unwrap();
        let out = lp.filtfilt(&[3.0; 200]);
        assert!(out.iter().all(|v| (v - 3.0).abs() < 1e-9));
    }

    #[test]
    fn bandpass_keeps_in_band_rhythm_without_phase_shift() {
        let sr = 250.0;
        let x = sine(10.0, sr, 2500);
        let bp = Cascade::butterworth_bandpass(4, sr, 1.0, 50.0).unwrap();
        let y = bp.filtfilt(&x);
        let err: Vec<f64> = (1000..1500).map(|i| y[i] - x[i]).collect();
        assert!(rms(&err) < 0.02, "rms error {}", rms(&err));
    }

    #[test]
    fn notch_removes_line_noise() {
        let sr = 250.0;
        let x = sine(50.0, sr, 2000);
        let notch = Cascade::notch(sr, 50.0, 2.0).unwrap();
        let y = notch.filtfilt(&x);
        assert!(rms(&y[500..1500]) < 0.01 * rms(&x[500..1500]));

        let keep = sine(10.0, sr, 2000);
        let kept = notch.filtfilt(&keep);
        assert!((rms(&kept[500..1500]) / rms(&keep[500..1500]) - 1.0).abs() < 0.01);
    }

    #[test]
    fn short_inputs_do_not_panic() {
        let bp = Cascade::butterworth_bandpass(4, 250.0, 7.0, 11.0).unwrap();
        assert!(bp.filtfilt(&[]).is_empty());
        assert_eq!(bp.filtfilt(&[1.0]).len(), 1);
        assert_eq!(bp.filtfilt(&[1.0, 2.0, 3.0]).len(), 3);
    }
}
