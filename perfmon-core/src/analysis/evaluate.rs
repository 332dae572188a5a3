use serde::Serialize;

use super::error::{Error, Result};

/// Class labels in matrix order.
pub const LABELS: [&str; 2] = ["no-peak", "peak"];

/// Binary confusion matrix with `peak` as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
    pub true_positive: u64,
}

impl ConfusionMatrix {
    pub fn from_labels(actual: &[bool], predicted: &[bool]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(Error::LengthMismatch {
                what: "actual and predicted labels",
                left: actual.len(),
                right: predicted.len(),
            });
        }

        let mut m = Self::default();
        for (a, p) in actual.iter().zip(predicted) {
            match (a, p) {
                (false, false) => m.true_negative += 1,
                (false, true) => m.false_positive += 1,
                (true, false) => m.false_negative += 1,
                (true, true) => m.true_positive += 1,
            }
        }
        Ok(m)
    }

    /// Rows are the actual class, columns the predicted class, both in [`LABELS`] order.
    #[must_use]
    pub fn as_array(&self) -> [[u64; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_negative + self.true_positive, self.total())
    }

    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    #[must_use]
    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of actual peak samples.
    pub support: u64,
}

impl ClassificationReport {
    pub fn evaluate(actual: &[bool], predicted: &[bool]) -> Result<Self> {
        Ok(Self::from(ConfusionMatrix::from_labels(actual, predicted)?))
    }
}

impl From<ConfusionMatrix> for ClassificationReport {
    fn from(matrix: ConfusionMatrix) -> Self {
        Self {
            accuracy: matrix.accuracy(),
            precision: matrix.precision(),
            recall: matrix.recall(),
            f1: matrix.f1(),
            support: matrix.true_positive + matrix.false_negative,
            matrix,
        }
    }
}

/// Thresholds a continuous score: `score >= cutoff` is a peak.
#[must_use]
pub fn peak_flags(score: &[f64], cutoff: f64) -> Vec<bool> {
    score.iter().map(|s| *s >= cutoff).collect()
}
