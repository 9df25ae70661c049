//! Inference Predictor
//!
//! Consumes a trained model read-only: decodes a raw image byte buffer,
//! resizes and normalizes it exactly like the training pipeline, runs the
//! composite classifier, and converts the output into a labeled result.
//! The binary head applies a fixed 0.5 decision threshold; the multi-class
//! head takes the arg-max and decodes it through the class index.

use std::path::{Path, PathBuf};

use burn::prelude::*;
use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::encoder::LabelEncoder;
use crate::error::{NeuroscanError, Result};
use crate::model::classifier::CompositeClassifier;
use crate::model::config::CompositeConfig;
use crate::model::persist::TrainedModel;

/// Label reported above the decision threshold by binary models
pub const POSITIVE_LABEL: &str = "Cancerous";
/// Label reported below the decision threshold by binary models
pub const NEGATIVE_LABEL: &str = "Non-Cancerous";
/// Fixed probability cutoff for the binary head
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Convert a binary-head probability into its fixed label
pub fn binary_label(probability: f32) -> &'static str {
    if probability > DECISION_THRESHOLD {
        POSITIVE_LABEL
    } else {
        NEGATIVE_LABEL
    }
}

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted label string
    pub label: String,
    /// Probability of the predicted label
    pub confidence: f32,
    /// Full output distribution (one entry per class; a single sigmoid
    /// probability for binary models)
    pub probabilities: Vec<f32>,
}

/// Read-only prediction service over a trained model
pub struct Predictor<B: Backend> {
    model: CompositeClassifier<B>,
    config: CompositeConfig,
    classes: LabelEncoder,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Wrap a trained model for inference
    pub fn new(trained: TrainedModel<B>, device: B::Device) -> Self {
        Self {
            model: trained.model,
            config: trained.config,
            classes: trained.classes,
            device,
        }
    }

    /// Load a persisted model and wrap it
    pub fn load(dir: &Path, device: B::Device) -> Result<Self> {
        let trained = TrainedModel::load(dir, &device)?;
        Ok(Self::new(trained, device))
    }

    /// The class index the model was trained with
    pub fn classes(&self) -> &LabelEncoder {
        &self.classes
    }

    /// Side length the model expects
    pub fn input_size(&self) -> usize {
        self.config.input_size
    }

    /// Predict from a raw image byte buffer.
    ///
    /// Undecodable input is a client error (`Image`), never a panic.
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction> {
        let img = image::load_from_memory(bytes).map_err(|e| {
            NeuroscanError::Image(PathBuf::from("<upload>"), e.to_string())
        })?;
        self.predict_image(&img)
    }

    /// Predict from an image file on disk
    pub fn predict_file(&self, path: &Path) -> Result<Prediction> {
        let img = image::open(path)
            .map_err(|e| NeuroscanError::Image(path.to_path_buf(), e.to_string()))?;
        self.predict_image(&img)
    }

    /// Predict from a decoded image
    pub fn predict_image(&self, img: &DynamicImage) -> Result<Prediction> {
        let pixels = self.preprocess(img);
        let size = self.config.input_size;
        let channels = self.config.in_channels;

        let input = Tensor::<B, 5>::from_floats(
            TensorData::new(pixels, [1, 1, channels, size, size]),
            &self.device,
        );
        let probs: Vec<f32> = self
            .model
            .forward_probs(input)
            .into_data()
            .to_vec()
            .map_err(|e| NeuroscanError::Training(format!("output readback: {:?}", e)))?;

        let prediction = if self.model.is_binary() {
            let p = probs[0];
            Prediction {
                label: binary_label(p).to_string(),
                confidence: if p > DECISION_THRESHOLD { p } else { 1.0 - p },
                probabilities: probs,
            }
        } else {
            let (index, &confidence) = probs
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .unwrap_or((0, &0.0));
            Prediction {
                label: self.classes.decode(index)?.to_string(),
                confidence,
                probabilities: probs,
            }
        };

        debug!(
            "Predicted '{}' with confidence {:.3}",
            prediction.label, prediction.confidence
        );
        Ok(prediction)
    }

    /// Resize and normalize to the training pipeline's representation
    fn preprocess(&self, img: &DynamicImage) -> Vec<f32> {
        let size = self.config.input_size;
        let rgb = img
            .resize_exact(size as u32, size as u32, FilterType::Triangle)
            .to_rgb8();

        let mut pixels = vec![0.0f32; 3 * size * size];
        for y in 0..size {
            for x in 0..size {
                let pixel = rgb.get_pixel(x as u32, y as u32);
                pixels[y * size + x] = pixel[0] as f32 / 255.0;
                pixels[size * size + y * size + x] = pixel[1] as f32 / 255.0;
                pixels[2 * size * size + y * size + x] = pixel[2] as f32 / 255.0;
            }
        }
        pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::model::config::HeadKind;

    fn predictor(head: HeadKind, labels: &[&str]) -> Predictor<DefaultBackend> {
        let device: <DefaultBackend as Backend>::Device = Default::default();
        let config = CompositeConfig::new(head)
            .with_input_size(16)
            .with_num_filters(4)
            .with_embedding_dim(8)
            .with_num_units(6);
        let model = CompositeClassifier::new(&config, &device);
        Predictor::new(
            TrainedModel {
                model,
                config,
                classes: LabelEncoder::fit(labels.iter().copied()),
            },
            device,
        )
    }

    #[test]
    fn test_binary_threshold() {
        assert_eq!(binary_label(0.73), POSITIVE_LABEL);
        assert_eq!(binary_label(0.40), NEGATIVE_LABEL);
        assert_eq!(binary_label(0.5), NEGATIVE_LABEL);
    }

    #[test]
    fn test_undecodable_bytes_are_a_client_error() {
        let p = predictor(
            HeadKind::Multiclass { num_classes: 3 },
            &["glioma", "meningioma", "pituitary"],
        );
        let err = p.predict_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, NeuroscanError::Image(_, _)));
    }

    #[test]
    fn test_multiclass_prediction_decodes_to_known_label() {
        let p = predictor(
            HeadKind::Multiclass { num_classes: 3 },
            &["glioma", "meningioma", "pituitary"],
        );
        let img = DynamicImage::new_rgb8(64, 64);
        let prediction = p.predict_image(&img).unwrap();

        assert!(["glioma", "meningioma", "pituitary"].contains(&prediction.label.as_str()));
        assert_eq!(prediction.probabilities.len(), 3);
        let sum: f32 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_binary_prediction_uses_fixed_labels() {
        let p = predictor(HeadKind::Binary, &["notumor", "tumor"]);
        let img = DynamicImage::new_rgb8(32, 32);
        let prediction = p.predict_image(&img).unwrap();

        assert!(prediction.label == POSITIVE_LABEL || prediction.label == NEGATIVE_LABEL);
        assert_eq!(prediction.probabilities.len(), 1);
        assert!(prediction.confidence >= 0.5 && prediction.confidence <= 1.0);
    }

    #[test]
    fn test_preprocess_matches_input_contract() {
        let p = predictor(
            HeadKind::Multiclass { num_classes: 3 },
            &["glioma", "meningioma", "pituitary"],
        );
        let img = DynamicImage::new_rgb8(100, 40);
        let pixels = p.preprocess(&img);
        assert_eq!(pixels.len(), 3 * 16 * 16);
        assert!(pixels.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
