//! Held-out evaluation of the binary classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Counts of a binary confusion matrix, rows = truth, columns = prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    /// Tallies paired truth and predicted labels.
    #[must_use]
    pub fn from_labels(truth: &[u8], predicted: &[u8]) -> Self {
        let mut matrix = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t, p) {
                (0, 0) => matrix.true_negative += 1,
                (0, _) => matrix.false_positive += 1,
                (_, 0) => matrix.false_negative += 1,
                _ => matrix.true_positive += 1,
            }
        }
        matrix
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }
}

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn new(true_pos: usize, false_pos: usize, false_neg: usize) -> Self {
        let precision = ratio(true_pos, true_pos + false_pos);
        let recall = ratio(true_pos, true_pos + false_neg);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            precision,
            recall,
            f1,
            support: true_pos + false_neg,
        }
    }
}

/// Evaluation of a classifier on a held-out split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    /// Metrics for outcome 0 and outcome 1.
    pub classes: [ClassMetrics; 2],
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl EvaluationReport {
    /// Builds the report from paired truth and predicted labels.
    #[must_use]
    pub fn from_predictions(truth: &[u8], predicted: &[u8]) -> Self {
        let confusion = ConfusionMatrix::from_labels(truth, predicted);
        let ConfusionMatrix {
            true_negative: tn,
            false_positive: fp,
            false_negative: fn_,
            true_positive: tp,
        } = confusion;

        let classes = [ClassMetrics::new(tn, fn_, fp), ClassMetrics::new(tp, fp, fn_)];
        let total = confusion.total();

        let average = |weight: &dyn Fn(&ClassMetrics) -> f64| {
            let weights: f64 = classes.iter().map(weight).sum();
            let combine = |metric: fn(&ClassMetrics) -> f64| {
                if weights > 0.0 {
                    classes.iter().map(|c| metric(c) * weight(c)).sum::<f64>() / weights
                } else {
                    0.0
                }
            };
            ClassMetrics {
                precision: combine(|c| c.precision),
                recall: combine(|c| c.recall),
                f1: combine(|c| c.f1),
                support: total,
            }
        };

        #[allow(clippy::cast_precision_loss)]
        let weighted_avg = average(&|c: &ClassMetrics| c.support as f64);
        let macro_avg = average(&|_: &ClassMetrics| 1.0);

        Self {
            accuracy: ratio(tn + tp, total),
            confusion,
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.confusion;
        writeln!(f, "Accuracy: {:.4}", self.accuracy)?;
        writeln!(f)?;
        writeln!(f, "Confusion Matrix:")?;
        writeln!(f, "[[{:>4} {:>4}]", c.true_negative, c.false_positive)?;
        writeln!(f, " [{:>4} {:>4}]]", c.false_negative, c.true_positive)?;
        writeln!(f)?;
        writeln!(f, "Classification Report:")?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;

        let rows = [
            ("0", &self.classes[0]),
            ("1", &self.classes[1]),
            ("macro avg", &self.macro_avg),
            ("weighted avg", &self.weighted_avg),
        ];
        for (name, m) in rows {
            writeln!(
                f,
                "{name:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix() {
        let truth = [0, 0, 1, 1, 1];
        let predicted = [0, 1, 1, 0, 1];
        let matrix = ConfusionMatrix::from_labels(&truth, &predicted);

        assert_eq!(matrix.true_negative, 1);
        assert_eq!(matrix.false_positive, 1);
        assert_eq!(matrix.false_negative, 1);
        assert_eq!(matrix.true_positive, 2);
        assert_eq!(matrix.total(), 5);
    }

    #[test]
    fn test_report_values() {
        let truth = [0, 0, 0, 1, 1];
        let predicted = [0, 0, 1, 1, 0];
        let report = EvaluationReport::from_predictions(&truth, &predicted);

        assert!((report.accuracy - 0.6).abs() < 1e-12);
        // class 0: tp=2, fp=1, fn=1
        assert!((report.classes[0].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.classes[0].recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.classes[0].support, 3);
        // class 1: tp=1, fp=1, fn=1
        assert!((report.classes[1].precision - 0.5).abs() < 1e-12);
        assert_eq!(report.classes[1].support, 2);

        let expected_weighted: f64 = (2.0 / 3.0 * 3.0 + 0.5 * 2.0) / 5.0;
        assert!((report.weighted_avg.recall - expected_weighted).abs() < 1e-12);
        assert_eq!(report.macro_avg.support, 5);
    }

    #[test]
    fn test_zero_division_yields_zero() {
        let report = EvaluationReport::from_predictions(&[0, 0], &[0, 0]);
        assert!(report.classes[1].precision.abs() < f64::EPSILON);
        assert!(report.classes[1].recall.abs() < f64::EPSILON);
        assert!((report.accuracy - 1.0).abs() < f64::EPSILON);

        let empty = EvaluationReport::from_predictions(&[], &[]);
        assert!(empty.accuracy.abs() < f64::EPSILON);
    }

    #[test]
    fn test_display_contains_sections() {
        let report = EvaluationReport::from_predictions(&[0, 1], &[0, 1]);
        let text = report.to_string();
        assert!(text.contains("Accuracy: 1.0000"));
        assert!(text.contains("Confusion Matrix:"));
        assert!(text.contains("weighted avg"));
    }
}
