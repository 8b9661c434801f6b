use serde::{Deserialize, Serialize};

/// Outcome of one evaluation session against ground truth.
///
/// Recall, precision and F1 refer to the right class (label 1) except
/// `left_recall`, which is the recall of label 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub score: usize,
    pub predictions: Vec<u8>,
    pub y_test: Vec<u8>,
    pub accuracy: f64,
    pub right_recall: f64,
    pub left_recall: f64,
    pub precision: f64,
    pub f1: f64,
}
