//! Evaluation Metrics
//!
//! Accuracy, per-class precision/recall, and a confusion matrix computed
//! from predicted and true class indices.

use serde::{Deserialize, Serialize};

/// Confusion matrix: rows are true classes, columns predicted classes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub num_classes: usize,
    /// Flattened row-major counts, `matrix[true * K + predicted]`
    pub counts: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn from_predictions(predictions: &[usize], targets: &[usize], num_classes: usize) -> Self {
        let mut counts = vec![0usize; num_classes * num_classes];
        for (&pred, &truth) in predictions.iter().zip(targets) {
            if pred < num_classes && truth < num_classes {
                counts[truth * num_classes + pred] += 1;
            }
        }
        Self { num_classes, counts }
    }

    pub fn get(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth * self.num_classes + predicted]
    }

    fn true_positives(&self, class: usize) -> usize {
        self.get(class, class)
    }

    fn predicted_count(&self, class: usize) -> usize {
        (0..self.num_classes).map(|t| self.get(t, class)).sum()
    }

    fn actual_count(&self, class: usize) -> usize {
        (0..self.num_classes).map(|p| self.get(class, p)).sum()
    }
}

/// Per-class precision/recall/F1 with the class's sample count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Aggregate evaluation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub total_samples: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub confusion: ConfusionMatrix,
}

impl Metrics {
    pub fn from_predictions(predictions: &[usize], targets: &[usize], num_classes: usize) -> Self {
        assert_eq!(
            predictions.len(),
            targets.len(),
            "predictions and targets must have the same length"
        );

        let confusion = ConfusionMatrix::from_predictions(predictions, targets, num_classes);
        let total_samples = predictions.len();
        let correct = predictions
            .iter()
            .zip(targets)
            .filter(|(p, t)| p == t)
            .count();
        let accuracy = if total_samples > 0 {
            correct as f64 / total_samples as f64
        } else {
            0.0
        };

        let per_class = (0..num_classes)
            .map(|class| {
                let tp = confusion.true_positives(class) as f64;
                let predicted = confusion.predicted_count(class) as f64;
                let support = confusion.actual_count(class);

                let precision = if predicted > 0.0 { tp / predicted } else { 0.0 };
                let recall = if support > 0 { tp / support as f64 } else { 0.0 };
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    class,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        Self {
            total_samples,
            correct,
            accuracy,
            per_class,
            confusion,
        }
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Accuracy: {:.2}% ({}/{})",
            self.accuracy * 100.0,
            self.correct,
            self.total_samples
        )?;
        for m in &self.per_class {
            writeln!(
                f,
                "  class {}: precision {:.2} recall {:.2} f1 {:.2} (n={})",
                m.class, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}
