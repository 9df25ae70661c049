//! # neuroscan
//!
//! Brain-MRI tumor classification with a hybrid CNN+LSTM model built on
//! the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: corpus loading, label encoding, class balancing,
//!   augmentation, and batch assembly
//! - `model`: the feature extractor, sequence aggregator, composite
//!   classifier, and trained-model persistence
//! - `training`: the training loop and cross-validated hyperparameter
//!   search
//! - `inference`: prediction over trained models, including the binary
//!   decision threshold used by the serving endpoint
//! - `metrics`: accuracy and confusion-matrix evaluation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use neuroscan::backend::TrainingBackend;
//! use neuroscan::dataset::{AugmentingSampler, MriDataset, SamplerConfig};
//! use neuroscan::model::{CompositeClassifier, CompositeConfig, HeadKind};
//!
//! let dataset = MriDataset::from_dir("data/brain_tumors", 128)?;
//! let sampler = AugmentingSampler::new(&dataset, SamplerConfig::default())?;
//! let config = CompositeConfig::new(HeadKind::Multiclass {
//!     num_classes: dataset.num_classes(),
//! });
//! // ... training and inference
//! ```

pub mod backend;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod training;

pub use dataset::{
    AugmentConfig, AugmentingSampler, LabelEncoder, MriBatch, MriBatcher, MriDataset, MriItem,
    MriSample, SamplerConfig,
};
pub use error::{NeuroscanError, Result};
pub use inference::{Prediction, Predictor};
pub use model::{Activation, CompositeClassifier, CompositeConfig, HeadKind, TrainedModel};
pub use training::{EpochMetrics, SearchOptions, SearchReport, TrainOptions};

/// Default input resolution for the corpus (square)
pub const IMAGE_SIZE: usize = 128;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
