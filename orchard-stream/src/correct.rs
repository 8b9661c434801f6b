//! Per-window timestamp correction.
//!
//! Timestamps are shifted so the earliest is zero, samples are stably
//! reordered by timestamp, and the timestamps are then spread evenly between
//! the observed minimum and maximum. The last step is a dejitter heuristic
//! that assumes a near-constant sampling rate; it does not resample the data
//! and will hide genuine irregularities in device timing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionOptions {
    pub reorder: bool,
    pub dejitter: bool,
}

impl Default for CorrectionOptions {
    fn default() -> Self {
        Self {
            reorder: true,
            dejitter: true,
        }
    }
}

/// Corrects a channel-major window in place of its inputs.
pub fn correct_timestamps(
    data: Vec<Vec<f64>>,
    timestamps: Vec<f64>,
    options: CorrectionOptions,
) -> (Vec<Vec<f64>>, Vec<f64>) {
    if timestamps.is_empty() {
        return (data, timestamps);
    }

    let min = timestamps.iter().copied().fold(f64::INFINITY, f64::min);
    let mut timestamps: Vec<f64> = timestamps.into_iter().map(|t| t - min).collect();
    let mut data = data;

    if options.reorder {
        let mut order: Vec<usize> = (0..timestamps.len()).collect();
        // `sort_by` is stable, so equal timestamps keep transport order.
        order.sort_by(|&a, &b| timestamps[a].total_cmp(&timestamps[b]));
        if order.iter().enumerate().any(|(i, &j)| i != j) {
            tracing::debug!("reordered out-of-order samples");
            timestamps = order.iter().map(|&i| timestamps[i]).collect();
            data = data
                .into_iter()
                .map(|channel| order.iter().map(|&i| channel[i]).collect())
                .collect();
        }
    }

    if options.dejitter {
        let lo = timestamps.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = timestamps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        timestamps = linspace(lo, hi, timestamps.len());
    }

    (data, timestamps)
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evenly_spaced(ts: &[f64]) -> bool {
        if ts.len() < 3 {
            return true;
        }
        let step = ts[1] - ts[0];
        ts.windows(2).all(|w| ((w[1] - w[0]) - step).abs() < 1e-9)
    }

    #[test]
    fn shifts_sorts_and_spreads() {
        let ts = vec![10.02, 10.00, 10.05, 10.01];
        let data = vec![vec![2.0, 0.0, 3.0, 1.0], vec![20.0, 0.0, 30.0, 10.0]];
        let (data, ts) = correct_timestamps(data, ts, CorrectionOptions::default());

        assert_eq!(data[0], vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(data[1], vec![0.0, 10.0, 20.0, 30.0]);
        assert_eq!(ts[0], 0.0);
        assert!((ts[3] - 0.05).abs() < 1e-9);
        assert!(evenly_spaced(&ts));
    }

    #[test]
    fn output_is_sorted_for_any_ordering() {
        // A few fixed permutations of a jittered ramp.
        let base: Vec<f64> = (0..32).map(|i| i as f64 / 250.0 + ((i * 7) % 5) as f64 * 1e-4).collect();
        for stride in [1usize, 3, 5, 7, 31] {
            let perm: Vec<f64> = (0..32).map(|i| base[(i * stride) % 32]).collect();
            let data = vec![perm.clone()];
            let (data, ts) = correct_timestamps(data, perm, CorrectionOptions::default());
            assert!(ts.windows(2).all(|w| w[0] <= w[1]));
            assert!(evenly_spaced(&ts));
            assert!(data[0].windows(2).all(|w| w[0] <= w[1]));
            let span = base[31] - base[0];
            assert!((ts[31] - span).abs() < 1e-9);
        }
    }

    #[test]
    fn equal_timestamps_keep_transport_order() {
        let ts = vec![1.0, 0.5, 1.0, 0.5];
        let data = vec![vec![1.0, 2.0, 3.0, 4.0]];
        let options = CorrectionOptions {
            reorder: true,
            dejitter: false,
        };
        let (data, ts) = correct_timestamps(data, ts, options);
        assert_eq!(data[0], vec![2.0, 4.0, 1.0, 3.0]);
        assert_eq!(ts, vec![0.0, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn degenerate_windows() {
        let (d, ts) = correct_timestamps(vec![vec![]], vec![], CorrectionOptions::default());
        assert!(ts.is_empty() && d[0].is_empty());

        let (_, ts) = correct_timestamps(vec![vec![4.0]], vec![7.5], CorrectionOptions::default());
        assert_eq!(ts, vec![0.0]);
    }
}
