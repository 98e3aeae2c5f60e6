//! Multi-class validation metrics derived from per-class confusion counts.

/// Confusion counts for a single class (one-vs-rest).
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassCounts {
    pub tp: usize,
    pub fp: usize,
    pub fn_count: usize,
    /// Number of ground-truth examples of this class.
    pub support: usize,
}

impl ClassCounts {
    pub fn precision(&self) -> f64 {
        if self.tp + self.fp > 0 {
            self.tp as f64 / (self.tp + self.fp) as f64
        } else {
            0.0
        }
    }

    pub fn recall(&self) -> f64 {
        if self.tp + self.fn_count > 0 {
            self.tp as f64 / (self.tp + self.fn_count) as f64
        } else {
            0.0
        }
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }
}

/// Validation metrics over all classes.
///
/// Macro averages weight every class equally regardless of support.
#[derive(Debug, Clone)]
pub struct ValidationMetrics {
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub per_class: Vec<ClassCounts>,
}

/// Compute multi-class metrics from predicted and ground-truth class indices.
///
/// Predictions outside `0..num_classes` count as errors against the true
/// class but contribute to no class's false positives.
pub fn compute_validation_metrics(
    predictions: &[u32],
    labels: &[u32],
    num_classes: usize,
) -> ValidationMetrics {
    assert_eq!(
        predictions.len(),
        labels.len(),
        "predictions and labels must have same length"
    );

    let mut per_class = vec![ClassCounts::default(); num_classes];
    let mut correct = 0usize;

    for (&pred, &label) in predictions.iter().zip(labels.iter()) {
        let (pred, label) = (pred as usize, label as usize);
        if label < num_classes {
            per_class[label].support += 1;
        }
        if pred == label {
            correct += 1;
            if label < num_classes {
                per_class[label].tp += 1;
            }
        } else {
            if pred < num_classes {
                per_class[pred].fp += 1;
            }
            if label < num_classes {
                per_class[label].fn_count += 1;
            }
        }
    }

    let total = predictions.len();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };

    let n = num_classes.max(1) as f64;
    let macro_precision = per_class.iter().map(ClassCounts::precision).sum::<f64>() / n;
    let macro_recall = per_class.iter().map(ClassCounts::recall).sum::<f64>() / n;
    let macro_f1 = per_class.iter().map(ClassCounts::f1).sum::<f64>() / n;

    ValidationMetrics {
        accuracy,
        macro_precision,
        macro_recall,
        macro_f1,
        per_class,
    }
}

impl std::fmt::Display for ValidationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "acc={:.4} macro_prec={:.4} macro_rec={:.4} macro_f1={:.4}",
            self.accuracy, self.macro_precision, self.macro_recall, self.macro_f1,
        )
    }
}
