//! Inference: read-only prediction over trained models.

pub mod predictor;

pub use predictor::{binary_label, Prediction, Predictor, DECISION_THRESHOLD};
