//! Integer-factor downsampling.
//!
//! Keeps every `factor`-th sample starting with the first. No anti-alias
//! filter is applied; callers band-limit the data beforehand.

/// Decimates every channel of a channel-major matrix. A factor of 0 or 1
/// returns the input unchanged.
pub fn decimate(data: &[Vec<f64>], factor: usize) -> Vec<Vec<f64>> {
    if factor <= 1 {
        return data.to_vec();
    }
    data.iter()
        .map(|channel| channel.iter().step_by(factor).copied().collect())
        .collect()
}
