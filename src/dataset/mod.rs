//! Dataset pipeline: corpus loading, label encoding, class balancing,
//! augmentation/sampling, and batch assembly for Burn.

pub mod augment;
pub mod balance;
pub mod batcher;
pub mod encoder;
pub mod loader;

pub use augment::{AugmentConfig, AugmentingSampler, SamplerConfig};
pub use balance::compute_class_weights;
pub use batcher::{MriBatch, MriBatcher, MriItem};
pub use encoder::LabelEncoder;
pub use loader::{DatasetStats, MriDataset, MriSample};
