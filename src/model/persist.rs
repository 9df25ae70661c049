//! Trained Model Persistence
//!
//! A trained model is two artifacts in one directory: the weight record
//! (`model.mpk`, Burn's CompactRecorder format) and a metadata JSON file
//! carrying the hyperparameter configuration and the fitted class index.
//! Loading rebuilds the module from the metadata and restores the record.

use std::path::Path;

use burn::module::Module;
use burn::prelude::*;
use burn::record::CompactRecorder;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::encoder::LabelEncoder;
use crate::error::{NeuroscanError, Result};
use crate::model::classifier::CompositeClassifier;
use crate::model::config::{CompositeConfig, HeadKind};

/// Weight record file stem (CompactRecorder appends its own extension)
const WEIGHTS_STEM: &str = "model";
/// Metadata file name
const METADATA_FILE: &str = "model.json";

#[derive(Debug, Serialize, Deserialize)]
struct ModelMetadata {
    config: CompositeConfig,
    classes: LabelEncoder,
}

/// A trained composite classifier with everything inference needs
#[derive(Debug)]
pub struct TrainedModel<B: Backend> {
    /// The learned parameters
    pub model: CompositeClassifier<B>,
    /// The hyperparameter configuration the model was built from
    pub config: CompositeConfig,
    /// The class index fitted at encoding time
    pub classes: LabelEncoder,
}

impl<B: Backend> TrainedModel<B> {
    /// Persist weights and metadata under `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let metadata = ModelMetadata {
            config: self.config.clone(),
            classes: self.classes.clone(),
        };
        let json = serde_json::to_string_pretty(&metadata).map_err(|e| {
            NeuroscanError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
        std::fs::write(dir.join(METADATA_FILE), json)?;

        let recorder = CompactRecorder::new();
        self.model
            .clone()
            .save_file(dir.join(WEIGHTS_STEM), &recorder)
            .map_err(|e| {
                NeuroscanError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("failed to write weight record: {:?}", e),
                ))
            })?;

        info!("Saved model to {:?}", dir);
        Ok(())
    }

    /// Load weights and metadata from `dir`
    pub fn load(dir: &Path, device: &B::Device) -> Result<Self> {
        let metadata_path = dir.join(METADATA_FILE);
        let json = std::fs::read_to_string(&metadata_path)
            .map_err(|e| NeuroscanError::ModelLoad(format!("{:?}: {}", metadata_path, e)))?;
        let metadata: ModelMetadata = serde_json::from_str(&json)
            .map_err(|e| NeuroscanError::ModelLoad(format!("invalid metadata: {}", e)))?;

        metadata
            .config
            .validate()
            .map_err(|e| NeuroscanError::ModelLoad(format!("invalid configuration: {}", e)))?;

        if let HeadKind::Multiclass { num_classes } = metadata.config.head {
            if num_classes != metadata.classes.len() {
                return Err(NeuroscanError::ModelLoad(format!(
                    "head has {} outputs but class index has {} labels",
                    num_classes,
                    metadata.classes.len()
                )));
            }
        }

        let recorder = CompactRecorder::new();
        let model = CompositeClassifier::<B>::new(&metadata.config, device)
            .load_file(dir.join(WEIGHTS_STEM), &recorder, device)
            .map_err(|e| NeuroscanError::ModelLoad(format!("weight record: {:?}", e)))?;

        info!("Loaded model from {:?}", dir);
        Ok(Self {
            model,
            config: metadata.config,
            classes: metadata.classes,
        })
    }
}
