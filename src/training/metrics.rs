//! Held-out evaluation metrics and the training report

use crate::features::FeatureMatrix;
use crate::model::{ForestClassifier, ForestRegressor};
use crate::{JudgeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Counts of (true class, predicted class) pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Sorted union of true and predicted labels
    pub labels: Vec<String>,
    /// `counts[true][predicted]`
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_predictions(truth: &[String], predicted: &[String]) -> Result<Self> {
        Self::with_classes(&[], truth, predicted)
    }

    /// Matrix over `classes` plus any label observed in `truth` or `predicted`
    pub fn with_classes(
        classes: &[String],
        truth: &[String],
        predicted: &[String],
    ) -> Result<Self> {
        check_lengths(truth.len(), predicted.len())?;

        let labels: Vec<String> = classes
            .iter()
            .chain(truth)
            .chain(predicted)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for (t, p) in truth.iter().zip(predicted) {
            let row = labels.binary_search(t).unwrap_or_default();
            let col = labels.binary_search(p).unwrap_or_default();
            counts[row][col] += 1;
        }

        Ok(ConfusionMatrix { labels, counts })
    }

    /// Count for a (true, predicted) label pair, zero for unseen labels
    pub fn get(&self, truth: &str, predicted: &str) -> usize {
        let row = self.labels.iter().position(|l| l == truth);
        let col = self.labels.iter().position(|l| l == predicted);
        match (row, col) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    /// Number of evaluation records whose true label is `labels[row]`
    pub fn row_total(&self, row: usize) -> usize {
        self.counts[row].iter().sum()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.labels.len()).map(|i| self.counts[i][i]).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(|l| l.len())
            .chain(self.counts.iter().flatten().map(|c| c.to_string().len()))
            .max()
            .unwrap_or(1)
            .max(4);

        write!(f, "{:>width$}", "", width = width)?;
        for label in &self.labels {
            write!(f, " {:>width$}", label, width = width)?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(&self.counts) {
            write!(f, "{:>width$}", label, width = width)?;
            for count in row {
                write!(f, " {:>width$}", count, width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub count: usize,
}

impl ClassificationMetrics {
    pub fn from_predictions(truth: &[String], predicted: &[String]) -> Result<Self> {
        Self::from_confusion(ConfusionMatrix::from_predictions(truth, predicted)?)
    }

    fn from_confusion(confusion_matrix: ConfusionMatrix) -> Result<Self> {
        let count = confusion_matrix.total();
        let accuracy = if count == 0 {
            0.0
        } else {
            confusion_matrix.correct() as f64 / count as f64
        };
        Ok(ClassificationMetrics {
            accuracy,
            confusion_matrix,
            count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mean_absolute_error: f64,
    pub root_mean_squared_error: f64,
    pub count: usize,
}

impl RegressionMetrics {
    pub fn from_predictions(truth: &[f64], predicted: &[f64]) -> Result<Self> {
        check_lengths(truth.len(), predicted.len())?;
        let count = truth.len();
        if count == 0 {
            return Ok(RegressionMetrics {
                mean_absolute_error: 0.0,
                root_mean_squared_error: 0.0,
                count,
            });
        }

        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        for (y, p) in truth.iter().zip(predicted) {
            let err = p - y;
            abs_sum += err.abs();
            sq_sum += err * err;
        }

        Ok(RegressionMetrics {
            mean_absolute_error: abs_sum / count as f64,
            root_mean_squared_error: (sq_sum / count as f64).sqrt(),
            count,
        })
    }
}

fn check_lengths(truth: usize, predicted: usize) -> Result<()> {
    if truth != predicted {
        return Err(JudgeError::ShapeMismatch {
            context: "evaluation labels vs predictions".to_string(),
            expected: truth,
            actual: predicted,
        });
    }
    Ok(())
}

/// Score a classifier on held-out rows; the confusion matrix covers every
/// class the model knows even when the held-out rows miss some
pub fn evaluate_classifier(
    model: &ForestClassifier,
    features: &FeatureMatrix,
    labels: &[String],
) -> Result<ClassificationMetrics> {
    let predicted = model.predict(features)?;
    ClassificationMetrics::from_confusion(ConfusionMatrix::with_classes(
        model.classes(),
        labels,
        &predicted,
    )?)
}

/// Score a regressor on held-out rows
pub fn evaluate_regressor(
    model: &ForestRegressor,
    features: &FeatureMatrix,
    targets: &[f64],
) -> Result<RegressionMetrics> {
    let predicted = model.predict(features)?;
    RegressionMetrics::from_predictions(targets, &predicted)
}

/// Everything reported after a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub created_at: DateTime<Utc>,
    pub seed: u64,
    pub train_records: usize,
    pub test_records: usize,
    /// Held-out record indices, ascending
    pub test_indices: Vec<usize>,
    pub text_features: usize,
    pub numeric_features: usize,
    pub classification: ClassificationMetrics,
    pub regression: RegressionMetrics,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model Evaluation")?;
        writeln!(f, "───────────────────────────────")?;
        writeln!(f, "  Train records:    {}", self.train_records)?;
        writeln!(f, "  Test records:     {}", self.test_records)?;
        writeln!(
            f,
            "  Features:         {} text + {} numeric",
            self.text_features, self.numeric_features
        )?;
        writeln!(f)?;
        writeln!(f, "Classification")?;
        writeln!(f, "  Accuracy:         {:.4}", self.classification.accuracy)?;
        writeln!(f, "  Confusion matrix (rows = true, columns = predicted):")?;
        for line in self.classification.confusion_matrix.to_string().lines() {
            writeln!(f, "    {}", line)?;
        }
        writeln!(f)?;
        writeln!(f, "Regression")?;
        writeln!(f, "  MAE:              {:.4}", self.regression.mean_absolute_error)?;
        writeln!(f, "  RMSE:             {:.4}", self.regression.root_mean_squared_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_accuracy_and_confusion() {
        let truth = labels(&["easy", "easy", "hard", "medium"]);
        let predicted = labels(&["easy", "hard", "hard", "easy"]);
        let metrics = ClassificationMetrics::from_predictions(&truth, &predicted).unwrap();

        assert_eq!(metrics.accuracy, 0.5);
        let cm = &metrics.confusion_matrix;
        assert_eq!(cm.labels, labels(&["easy", "hard", "medium"]));
        assert_eq!(cm.get("easy", "hard"), 1);
        assert_eq!(cm.get("medium", "easy"), 1);
        assert_eq!(cm.get("medium", "medium"), 0);
        assert_eq!(cm.row_total(0), 2);
        assert_eq!(cm.total(), 4);
    }

    #[test]
    fn test_confusion_covers_predicted_only_labels() {
        let truth = labels(&["a", "a"]);
        let predicted = labels(&["a", "b"]);
        let cm = ConfusionMatrix::from_predictions(&truth, &predicted).unwrap();
        assert_eq!(cm.counts, vec![vec![1, 1], vec![0, 0]]);
    }

    #[test]
    fn test_confusion_includes_known_classes() {
        let classes = labels(&["a", "b", "c"]);
        let cm =
            ConfusionMatrix::with_classes(&classes, &labels(&["b"]), &labels(&["b"])).unwrap();
        assert_eq!(cm.labels, classes);
        assert_eq!(cm.get("b", "b"), 1);
        assert_eq!(cm.total(), 1);
    }

    #[test]
    fn test_regression_metrics() {
        let metrics =
            RegressionMetrics::from_predictions(&[1.0, 2.0, 3.0], &[2.0, 2.0, 6.0]).unwrap();
        assert!((metrics.mean_absolute_error - 4.0 / 3.0).abs() < 1e-12);
        assert!((metrics.root_mean_squared_error - (10.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_regression_is_zero() {
        let metrics = RegressionMetrics::from_predictions(&[1.5, -2.0], &[1.5, -2.0]).unwrap();
        assert_eq!(metrics.mean_absolute_error, 0.0);
        assert_eq!(metrics.root_mean_squared_error, 0.0);
    }

    #[test]
    fn test_single_miss_gives_positive_errors() {
        let truth = [1.5, -2.0, 4.0];
        let metrics = RegressionMetrics::from_predictions(&truth, &[1.5, -2.0, 4.25]).unwrap();
        assert!(metrics.mean_absolute_error > 0.0);
        assert!(metrics.root_mean_squared_error > 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let err = RegressionMetrics::from_predictions(&[1.0], &[]).unwrap_err();
        assert!(matches!(err, JudgeError::ShapeMismatch { .. }));
        let err = ConfusionMatrix::from_predictions(&labels(&["a"]), &[]).unwrap_err();
        assert!(matches!(err, JudgeError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_confusion_display() {
        let cm =
            ConfusionMatrix::from_predictions(&labels(&["x", "y"]), &labels(&["x", "x"])).unwrap();
        let text = cm.to_string();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().trim_start().starts_with('x'));
    }
}
