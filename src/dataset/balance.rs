//! Class Balancing
//!
//! Computes per-class training weights inversely proportional to class
//! frequency so that skewed label distributions do not dominate the loss.

use tracing::debug;

use crate::dataset::encoder::LabelEncoder;
use crate::error::{NeuroscanError, Result};

/// Compute balanced class weights for a set of training labels.
///
/// For class `c` with `count_c` samples out of `total`, the weight is
/// `total / (num_classes * count_c)`, so `sum(count_c * w_c) == total`.
/// The result is indexed by class index and is consumed only by the loss.
pub fn compute_class_weights(labels: &[usize], classes: &LabelEncoder) -> Result<Vec<f32>> {
    let num_classes = classes.len();
    if num_classes == 0 {
        return Err(NeuroscanError::Config(
            "cannot balance an empty class index".to_string(),
        ));
    }

    let mut counts = vec![0usize; num_classes];
    for &label in labels {
        if label >= num_classes {
            return Err(NeuroscanError::UnknownLabel(format!("class index {}", label)));
        }
        counts[label] += 1;
    }

    let total = labels.len() as f64;
    let mut weights = Vec::with_capacity(num_classes);
    for (idx, &count) in counts.iter().enumerate() {
        if count == 0 {
            let name = classes.decode(idx)?.to_string();
            return Err(NeuroscanError::EmptyClass(name));
        }
        weights.push((total / (num_classes as f64 * count as f64)) as f32);
    }

    debug!("Class weights: {:?}", weights);
    Ok(weights)
}
