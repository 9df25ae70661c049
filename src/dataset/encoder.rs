//! Label Encoding
//!
//! Maps categorical label strings to a fixed set of numeric class indices.
//! The mapping is built once from the observed label set (sorted for
//! determinism) and is immutable afterwards; it is persisted alongside the
//! trained model so inference can decode prediction indices back to names.

use serde::{Deserialize, Serialize};

use crate::error::{NeuroscanError, Result};

/// A fitted bijection between label strings and class indices 0..K-1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit an encoder from the distinct labels observed in the corpus.
    ///
    /// Labels are deduplicated and sorted so the index assignment is stable
    /// across runs regardless of input order.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Number of classes in the fitted index
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check whether the encoder is empty (nothing fitted)
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The canonical class ordering
    pub fn labels(&self) -> &[String] {
        &self.classes
    }

    /// Map a label string to its class index
    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .iter()
            .position(|c| c == label)
            .ok_or_else(|| NeuroscanError::UnknownLabel(label.to_string()))
    }

    /// Map a class index back to its label string; exact inverse of `encode`
    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| NeuroscanError::UnknownLabel(format!("class index {}", index)))
    }

    /// One-hot vector of length K with a single 1 at `index`
    pub fn to_onehot(&self, index: usize) -> Result<Vec<f32>> {
        if index >= self.classes.len() {
            return Err(NeuroscanError::UnknownLabel(format!("class index {}", index)));
        }
        let mut onehot = vec![0.0f32; self.classes.len()];
        onehot[index] = 1.0;
        Ok(onehot)
    }
}
