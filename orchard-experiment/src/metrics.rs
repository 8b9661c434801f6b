//! Evaluation scores of a test session. Undefined ratios are reported as
//! zero.

use orchard_store::TestResult;

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Scores `predictions` against `truths`, label 1 being the positive class.
/// Extra entries in the longer slice are ignored.
pub fn evaluate(predictions: &[u8], truths: &[u8]) -> TestResult {
    let n = predictions.len().min(truths.len());
    let (mut tp, mut tn, mut fp, mut fn_) = (0, 0, 0, 0);
    for (p, t) in predictions.iter().zip(truths).take(n) {
        match (p, t) {
            (1, 1) => tp += 1,
            (0, 0) => tn += 1,
            (1, _) => fp += 1,
            _ => fn_ += 1,
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    TestResult {
        score: tp + tn,
        predictions: predictions[..n].to_vec(),
        y_test: truths[..n].to_vec(),
        accuracy: ratio(tp + tn, n),
        right_recall: recall,
        left_recall: ratio(tn, tn + fp),
        precision,
        f1,
    }
}
