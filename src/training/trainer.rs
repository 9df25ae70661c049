//! Training Loop
//!
//! Epoch-bounded optimization of a composite classifier with Burn's API
//! directly: forward, class-weighted loss, backward, Adam step per batch,
//! then a validation pass per epoch. The reference behavior is a fixed
//! epoch count; early stopping is an optional enhancement that is off by
//! default.

use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{activation::sigmoid, backend::AutodiffBackend, ElementConversion},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::augment::{AugmentingSampler, BatchIter};
use crate::dataset::batcher::{MriBatch, MriBatcher};
use crate::error::{NeuroscanError, Result};
use crate::model::classifier::CompositeClassifier;
use crate::model::config::CompositeConfig;

/// Optional early-stopping enhancement (off by default)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EarlyStopping {
    /// Stop after this many epochs without validation improvement
    pub patience: usize,
    /// Minimum accuracy gain that counts as an improvement
    pub min_delta: f64,
}

/// Training run options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOptions {
    /// Number of epochs; the run always terminates after this many
    pub epochs: usize,
    /// Seed for parameter initialization
    pub seed: u64,
    /// Early stopping, disabled in the reference behavior
    pub early_stop: Option<EarlyStopping>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 50,
            seed: 42,
            early_stop: None,
        }
    }
}

/// One epoch's recorded metrics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Train a composite classifier over the sampler's training batches,
/// evaluating on the validation batches after every epoch.
///
/// `class_weights` scales each sample's loss by its class weight; `None`
/// trains unweighted. Returns the trained model and the per-epoch metric
/// history.
pub fn fit<B: AutodiffBackend>(
    mut model: CompositeClassifier<B>,
    config: &CompositeConfig,
    sampler: &AugmentingSampler<'_>,
    class_weights: Option<Vec<f32>>,
    options: &TrainOptions,
    device: &B::Device,
) -> Result<(CompositeClassifier<B>, Vec<EpochMetrics>)> {
    if sampler.train_len() == 0 {
        return Err(NeuroscanError::Training("no training samples".to_string()));
    }
    if let Some(weights) = &class_weights {
        let expected = if model.is_binary() { 2 } else { model.num_outputs() };
        if weights.len() != expected {
            return Err(NeuroscanError::Training(format!(
                "{} class weights for a {}-output head",
                weights.len(),
                expected
            )));
        }
    }

    B::seed(options.seed);

    let binary = model.is_binary();
    let batcher = MriBatcher::new(config.input_size, config.in_channels);
    let mut optimizer = AdamConfig::new().init();
    let inner_device = <B::InnerBackend as Backend>::Device::default();

    let mut history: Vec<EpochMetrics> = Vec::with_capacity(options.epochs);
    let mut best_val = f64::NEG_INFINITY;
    let mut epochs_without_improvement = 0usize;

    for epoch in 0..options.epochs {
        let mut total_loss = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;
        let mut num_batches = 0usize;

        for items in sampler.train_batches(epoch) {
            let batch: MriBatch<B> = batcher.batch(items, device);
            let logits = model.forward(batch.images.clone());

            let loss = batch_loss(
                logits.clone(),
                batch.targets.clone(),
                class_weights.as_deref(),
                binary,
            );
            total_loss += loss.clone().into_scalar().elem::<f64>();
            correct += count_correct(&logits, &batch.targets, binary);
            seen += batch.targets.dims()[0];
            num_batches += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let train_loss = total_loss / num_batches.max(1) as f64;
        let train_accuracy = correct as f64 / seen.max(1) as f64;

        let (val_loss, val_accuracy) = evaluate(
            &model.valid(),
            sampler.validation_batches(),
            class_weights.as_deref(),
            &batcher,
            &inner_device,
        );

        info!(
            "Epoch {}/{}: loss = {:.4}, acc = {:.2}% | val loss = {:.4}, val acc = {:.2}%",
            epoch + 1,
            options.epochs,
            train_loss,
            train_accuracy * 100.0,
            val_loss,
            val_accuracy * 100.0
        );

        history.push(EpochMetrics {
            train_loss,
            train_accuracy,
            val_loss,
            val_accuracy,
        });

        if let Some(early) = options.early_stop {
            if val_accuracy > best_val + early.min_delta {
                best_val = val_accuracy;
                epochs_without_improvement = 0;
            } else {
                epochs_without_improvement += 1;
                if epochs_without_improvement >= early.patience {
                    info!(
                        "Early stopping after {} epochs without improvement",
                        early.patience
                    );
                    break;
                }
            }
        }
    }

    Ok((model, history))
}

/// Evaluate a model over a batch sequence, returning (mean loss, accuracy)
pub fn evaluate<B: Backend>(
    model: &CompositeClassifier<B>,
    batches: BatchIter<'_>,
    class_weights: Option<&[f32]>,
    batcher: &MriBatcher,
    device: &B::Device,
) -> (f64, f64) {
    let binary = model.is_binary();
    let mut total_loss = 0.0f64;
    let mut correct = 0usize;
    let mut seen = 0usize;
    let mut num_batches = 0usize;

    for items in batches {
        let batch: MriBatch<B> = batcher.batch(items, device);
        let logits = model.forward(batch.images.clone());

        let loss = batch_loss(logits.clone(), batch.targets.clone(), class_weights, binary);
        total_loss += loss.into_scalar().elem::<f64>();
        correct += count_correct(&logits, &batch.targets, binary);
        seen += batch.targets.dims()[0];
        num_batches += 1;
    }

    let loss = total_loss / num_batches.max(1) as f64;
    let accuracy = if seen > 0 {
        correct as f64 / seen as f64
    } else {
        0.0
    };
    (loss, accuracy)
}

/// Run a model over a batch sequence, collecting (predicted, true) indices
pub fn predict<B: Backend>(
    model: &CompositeClassifier<B>,
    batches: BatchIter<'_>,
    batcher: &MriBatcher,
    device: &B::Device,
) -> (Vec<usize>, Vec<usize>) {
    let binary = model.is_binary();
    let mut predictions = Vec::new();
    let mut targets = Vec::new();

    for items in batches {
        let batch: MriBatch<B> = batcher.batch(items, device);
        let logits = model.forward(batch.images);

        let preds = class_predictions(&logits, binary);
        let truth: Vec<i64> = batch.targets.into_data().to_vec().unwrap_or_default();

        predictions.extend(preds);
        targets.extend(truth.into_iter().map(|t| t as usize));
    }

    (predictions, targets)
}

fn class_predictions<B: Backend>(logits: &Tensor<B, 2>, binary: bool) -> Vec<usize> {
    if binary {
        let probs: Vec<f32> = sigmoid(logits.clone().squeeze::<1>(1))
            .into_data()
            .to_vec()
            .unwrap_or_default();
        probs.into_iter().map(|p| usize::from(p >= 0.5)).collect()
    } else {
        let preds: Vec<i64> = logits
            .clone()
            .argmax(1)
            .squeeze::<1>(1)
            .into_data()
            .to_vec()
            .unwrap_or_default();
        preds.into_iter().map(|p| p as usize).collect()
    }
}

fn count_correct<B: Backend>(
    logits: &Tensor<B, 2>,
    targets: &Tensor<B, 1, Int>,
    binary: bool,
) -> usize {
    let predictions = if binary {
        sigmoid(logits.clone().squeeze::<1>(1))
            .greater_elem(0.5)
            .int()
    } else {
        logits.clone().argmax(1).squeeze::<1>(1)
    };

    let batch_correct: i64 = predictions
        .equal(targets.clone())
        .int()
        .sum()
        .into_scalar()
        .elem();
    batch_correct as usize
}

/// Loss for one batch: class-weighted categorical cross-entropy for the
/// multi-class head, weighted binary cross-entropy for the binary head.
fn batch_loss<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    class_weights: Option<&[f32]>,
    binary: bool,
) -> Tensor<B, 1> {
    if binary {
        weighted_binary_cross_entropy(logits, targets, class_weights)
    } else {
        let mut config = CrossEntropyLossConfig::new();
        if let Some(weights) = class_weights {
            config = config.with_weights(Some(weights.to_vec()));
        }
        config.init(&logits.device()).forward(logits, targets)
    }
}

/// Binary cross-entropy over a single sigmoid output, with optional
/// per-class weights gathered per sample
fn weighted_binary_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    class_weights: Option<&[f32]>,
) -> Tensor<B, 1> {
    let device = logits.device();
    let probs = sigmoid(logits.squeeze::<1>(1)).clamp(1e-7, 1.0 - 1e-7);
    let truth = targets.clone().float();

    let positive = truth.clone() * probs.clone().log();
    let negative = (truth.neg().add_scalar(1.0)) * (probs.neg().add_scalar(1.0)).log();
    let nll = (positive + negative).neg();

    match class_weights {
        Some(weights) => {
            let weight_table = Tensor::<B, 1>::from_floats(weights, &device);
            let sample_weights = weight_table.gather(0, targets);
            let eps = Tensor::<B, 1>::from_floats([1e-8], &device);
            (nll * sample_weights.clone()).sum() / (sample_weights.sum() + eps)
        }
        None => nll.mean(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DefaultBackend, TrainingBackend};
    use crate::dataset::encoder::LabelEncoder;
    use crate::dataset::loader::{MriDataset, MriSample};
    use crate::dataset::SamplerConfig;
    use crate::dataset::AugmentConfig;
    use crate::model::config::HeadKind;
    use std::path::PathBuf;

    fn separable_dataset(n: usize, image_size: usize) -> MriDataset {
        let classes = LabelEncoder::fit(["bright", "dark"]);
        let samples = (0..n)
            .map(|i| {
                let bright = i % 2 == 0;
                let shade = if bright { 0.9 } else { 0.1 };
                MriSample {
                    pixels: vec![shade; 3 * image_size * image_size],
                    label: usize::from(!bright),
                    class_name: if bright { "bright" } else { "dark" }.to_string(),
                    path: PathBuf::from(format!("{}.png", i)),
                }
            })
            .collect();
        MriDataset {
            samples,
            classes,
            image_size,
            channels: 3,
        }
    }

    fn tiny_config(head: HeadKind) -> CompositeConfig {
        CompositeConfig::new(head)
            .with_input_size(8)
            .with_num_filters(4)
            .with_embedding_dim(8)
            .with_num_units(6)
            .with_cnn_dropout(0.0)
            .with_rnn_dropout(0.0)
            .with_head_dropout(0.0)
            .with_learning_rate(1e-2)
    }

    fn sampler_config() -> SamplerConfig {
        SamplerConfig {
            batch_size: 4,
            validation_fraction: 0.25,
            seed: 42,
            augment: AugmentConfig::none(),
        }
    }

    #[test]
    fn test_fit_learns_separable_signal() {
        let dataset = separable_dataset(16, 8);
        let sampler = AugmentingSampler::new(&dataset, sampler_config()).unwrap();
        let config = tiny_config(HeadKind::Multiclass { num_classes: 2 });

        let device = Default::default();
        let model = CompositeClassifier::<TrainingBackend>::new(&config, &device);
        let options = TrainOptions {
            epochs: 8,
            seed: 42,
            early_stop: None,
        };

        let (_, history) = fit(model, &config, &sampler, None, &options, &device).unwrap();

        assert_eq!(history.len(), 8);
        let last = history.last().unwrap();
        assert!((0.0..=1.0).contains(&last.val_accuracy));
        assert!(
            last.train_accuracy > history[0].train_accuracy || last.train_accuracy == 1.0,
            "training accuracy never improved: {:?}",
            history
        );
    }

    #[test]
    fn test_fit_binary_head() {
        let dataset = separable_dataset(16, 8);
        let sampler = AugmentingSampler::new(&dataset, sampler_config()).unwrap();
        let config = tiny_config(HeadKind::Binary);

        let device = Default::default();
        let model = CompositeClassifier::<TrainingBackend>::new(&config, &device);
        let options = TrainOptions {
            epochs: 3,
            seed: 7,
            early_stop: None,
        };

        let (_, history) =
            fit(model, &config, &sampler, Some(vec![1.0, 1.0]), &options, &device).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|m| m.train_loss.is_finite()));
    }

    #[test]
    fn test_wrong_weight_count_rejected() {
        let dataset = separable_dataset(8, 8);
        let sampler = AugmentingSampler::new(&dataset, sampler_config()).unwrap();
        let config = tiny_config(HeadKind::Multiclass { num_classes: 2 });

        let device = Default::default();
        let model = CompositeClassifier::<TrainingBackend>::new(&config, &device);

        let result = fit(
            model,
            &config,
            &sampler,
            Some(vec![1.0, 1.0, 1.0]),
            &TrainOptions::default(),
            &device,
        );
        assert!(matches!(result, Err(NeuroscanError::Training(_))));
    }

    #[test]
    fn test_predict_collects_every_sample() {
        let dataset = separable_dataset(12, 8);
        let sampler = AugmentingSampler::new(&dataset, sampler_config()).unwrap();
        let config = tiny_config(HeadKind::Multiclass { num_classes: 2 });

        let device = Default::default();
        let model = CompositeClassifier::<DefaultBackend>::new(&config, &device);
        let batcher = MriBatcher::new(config.input_size, config.in_channels);

        let (preds, targets) = predict(&model, sampler.validation_batches(), &batcher, &device);
        assert_eq!(preds.len(), sampler.val_len());
        assert_eq!(targets.len(), sampler.val_len());
        assert!(preds.iter().all(|&p| p < 2));
    }
}
