//! Classification metrics computed from a confusion matrix

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Label;

/// Precision, recall, F1 and support for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

/// Held-out evaluation of one model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub accuracy: f64,
    pub f1_macro: f64,
    pub f1_weighted: f64,
    pub per_class: BTreeMap<Label, ClassMetrics>,
    /// Rows are true labels, columns predicted labels, both in `labels` order
    pub confusion_matrix: Vec<Vec<u64>>,
    pub labels: Vec<Label>,
}

impl MetricsReport {
    /// Build a report from parallel true/predicted label sequences.
    ///
    /// Pairs whose labels are not in `labels` are ignored. Macro F1 averages
    /// over the classes that occur in either sequence; a class that is never
    /// predicted scores a precision of zero.
    pub fn from_predictions(y_true: &[Label], y_pred: &[Label], labels: &[Label]) -> Self {
        let n = labels.len();
        let index = |label: &Label| labels.iter().position(|l| l == label);

        let mut matrix = vec![vec![0u64; n]; n];
        for (t, p) in y_true.iter().zip(y_pred) {
            if let (Some(ti), Some(pi)) = (index(t), index(p)) {
                matrix[ti][pi] += 1;
            }
        }

        let total: u64 = matrix.iter().flatten().sum();
        let correct: u64 = (0..n).map(|i| matrix[i][i]).sum();
        let accuracy = ratio(correct, total);

        let mut per_class = BTreeMap::new();
        let mut f1_sum = 0.0;
        let mut f1_weighted_sum = 0.0;
        let mut present = 0usize;

        for (i, label) in labels.iter().enumerate() {
            let tp = matrix[i][i];
            let support: u64 = matrix[i].iter().sum();
            let predicted: u64 = (0..n).map(|r| matrix[r][i]).sum();

            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            if support > 0 || predicted > 0 {
                f1_sum += f1;
                present += 1;
            }
            f1_weighted_sum += f1 * support as f64;

            per_class.insert(
                *label,
                ClassMetrics {
                    precision,
                    recall,
                    f1,
                    support,
                },
            );
        }

        Self {
            accuracy,
            f1_macro: if present > 0 { f1_sum / present as f64 } else { 0.0 },
            f1_weighted: if total > 0 { f1_weighted_sum / total as f64 } else { 0.0 },
            per_class,
            confusion_matrix: matrix,
            labels: labels.to_vec(),
        }
    }

    /// Number of evaluated examples
    pub fn support_total(&self) -> u64 {
        self.confusion_matrix.iter().flatten().sum()
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Headline numbers of one version, for side-by-side comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionComparison {
    pub version: u32,
    pub accuracy: f64,
    pub f1_macro: f64,
    pub f1_weighted: f64,
}

/// Headline metrics for each `(version, report)` pair, in the given order
pub fn compare<'a>(
    reports: impl IntoIterator<Item = (u32, &'a MetricsReport)>,
) -> Vec<VersionComparison> {
    reports
        .into_iter()
        .map(|(version, report)| VersionComparison {
            version,
            accuracy: report.accuracy,
            f1_macro: report.f1_macro,
            f1_weighted: report.f1_weighted,
        })
        .collect()
}
