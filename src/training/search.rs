//! Hyperparameter Search
//!
//! Cross-validated grid search over the declared axes of each branch. The
//! CNN axes are searched first against a fixed default aggregator, then
//! the aggregator axes against the winning CNN configuration, mirroring
//! the original per-branch experiment design. Candidates are scored by a
//! direct `evaluate_candidate(config) -> score` call; ties break toward
//! the first candidate in deterministic enumeration order.

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::augment::{AugmentConfig, AugmentingSampler, SamplerConfig};
use crate::dataset::balance::compute_class_weights;
use crate::dataset::loader::MriDataset;
use crate::error::{NeuroscanError, Result};
use crate::model::classifier::CompositeClassifier;
use crate::model::config::{Activation, CompositeConfig};
use crate::model::persist::TrainedModel;
use crate::training::trainer::{self, EpochMetrics, TrainOptions};

/// Candidate axes for the CNN branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorGrid {
    pub num_filters: Vec<usize>,
    pub kernel_sizes: Vec<usize>,
    pub activations: Vec<Activation>,
    pub pool_sizes: Vec<usize>,
    pub dropout_rates: Vec<f64>,
    pub learning_rates: Vec<f64>,
}

impl Default for ExtractorGrid {
    fn default() -> Self {
        Self {
            num_filters: vec![16, 32, 64],
            kernel_sizes: vec![3, 5, 7],
            activations: vec![Activation::Relu, Activation::Sigmoid],
            pool_sizes: vec![2, 3],
            dropout_rates: vec![0.2, 0.3, 0.4],
            learning_rates: vec![1e-4, 1e-3, 1e-2],
        }
    }
}

impl ExtractorGrid {
    fn validate(&self) -> Result<()> {
        let axes: [(&'static str, bool); 6] = [
            ("cnn.num_filters", self.num_filters.is_empty()),
            ("cnn.kernel_sizes", self.kernel_sizes.is_empty()),
            ("cnn.activations", self.activations.is_empty()),
            ("cnn.pool_sizes", self.pool_sizes.is_empty()),
            ("cnn.dropout_rates", self.dropout_rates.is_empty()),
            ("cnn.learning_rates", self.learning_rates.is_empty()),
        ];
        for (name, empty) in axes {
            if empty {
                return Err(NeuroscanError::EmptySearchSpace(name));
            }
        }
        Ok(())
    }
}

/// Candidate axes for the LSTM branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorGrid {
    pub num_units: Vec<usize>,
    pub dropout_rates: Vec<f64>,
    pub learning_rates: Vec<f64>,
}

impl Default for AggregatorGrid {
    fn default() -> Self {
        Self {
            num_units: vec![32, 64, 128],
            dropout_rates: vec![0.2, 0.3, 0.4],
            learning_rates: vec![1e-4, 1e-3, 1e-2],
        }
    }
}

impl AggregatorGrid {
    fn validate(&self) -> Result<()> {
        let axes: [(&'static str, bool); 3] = [
            ("rnn.num_units", self.num_units.is_empty()),
            ("rnn.dropout_rates", self.dropout_rates.is_empty()),
            ("rnn.learning_rates", self.learning_rates.is_empty()),
        ];
        for (name, empty) in axes {
            if empty {
                return Err(NeuroscanError::EmptySearchSpace(name));
            }
        }
        Ok(())
    }
}

/// Search options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Cross-validation fold count
    pub folds: usize,
    /// Shortened epoch count for each candidate fold
    pub candidate_epochs: usize,
    /// Epoch count for the final training of the winner
    pub final_epochs: usize,
    /// Mini-batch size throughout
    pub batch_size: usize,
    /// Seed for fold assignment and candidate subsampling
    pub seed: u64,
    /// Randomized mode: evaluate at most this many candidates per branch,
    /// drawn deterministically from the full grid
    pub max_candidates: Option<usize>,
    /// Validation fraction and augmentation for the final training run
    pub final_validation_fraction: f64,
    pub final_augment: AugmentConfig,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            folds: 3,
            candidate_epochs: 10,
            final_epochs: 50,
            batch_size: 32,
            seed: 42,
            max_candidates: None,
            final_validation_fraction: 0.2,
            final_augment: AugmentConfig::default(),
        }
    }
}

/// Outcome summary of a search run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    /// The winning configuration
    pub best_config: CompositeConfig,
    /// Its mean held-out accuracy across folds
    pub best_score: f64,
    /// Total candidates evaluated across both branches
    pub evaluated: usize,
}

/// Mean cross-validated accuracy of one candidate configuration.
///
/// Each fold trains a private model from scratch for the shortened epoch
/// count and is scored on the held-out fold. Candidate folds train
/// unweighted: a small fold may lack a class entirely, which would make
/// balancing degenerate; the final training run applies class weights.
pub fn evaluate_candidate<B: AutodiffBackend>(
    dataset: &MriDataset,
    config: &CompositeConfig,
    options: &SearchOptions,
    device: &B::Device,
) -> Result<f64> {
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    indices.shuffle(&mut rng);

    let train_options = TrainOptions {
        epochs: options.candidate_epochs,
        seed: options.seed,
        early_stop: None,
    };

    let mut fold_accuracies = Vec::with_capacity(options.folds);
    for fold in 0..options.folds {
        let start = fold * indices.len() / options.folds;
        let end = (fold + 1) * indices.len() / options.folds;
        let val_indices = indices[start..end].to_vec();
        let train_indices: Vec<usize> = indices[..start]
            .iter()
            .chain(&indices[end..])
            .copied()
            .collect();

        let sampler = AugmentingSampler::from_indices(
            dataset,
            train_indices,
            val_indices,
            SamplerConfig {
                batch_size: options.batch_size,
                validation_fraction: 0.0,
                seed: options.seed,
                augment: AugmentConfig::none(),
            },
        )?;

        // Re-seed before construction so every candidate starts from the
        // same initialization regardless of evaluation order.
        B::seed(options.seed);
        let model = CompositeClassifier::<B>::new(config, device);
        let (_, history) = trainer::fit(model, config, &sampler, None, &train_options, device)?;

        let accuracy = history.last().map(|m| m.val_accuracy).unwrap_or(0.0);
        fold_accuracies.push(accuracy);
    }

    let mean = fold_accuracies.iter().sum::<f64>() / fold_accuracies.len().max(1) as f64;
    Ok(mean)
}

/// Run the full two-branch search and train the winner.
///
/// Returns the final trained model, its training history, and the report.
pub fn run<B: AutodiffBackend>(
    dataset: &MriDataset,
    base: &CompositeConfig,
    cnn_grid: &ExtractorGrid,
    rnn_grid: &AggregatorGrid,
    options: &SearchOptions,
    device: &B::Device,
) -> Result<(TrainedModel<B::InnerBackend>, Vec<EpochMetrics>, SearchReport)> {
    cnn_grid.validate()?;
    rnn_grid.validate()?;
    if options.folds < 2 {
        return Err(NeuroscanError::Config("need at least 2 folds".to_string()));
    }
    if dataset.len() < options.folds {
        return Err(NeuroscanError::Config(format!(
            "{} samples cannot fill {} folds",
            dataset.len(),
            options.folds
        )));
    }

    // CNN branch first, against the base aggregator settings.
    let cnn_candidates = subsample(expand_extractor(base, cnn_grid), options);
    info!("Searching CNN branch: {} candidates", cnn_candidates.len());
    let (best_cnn, cnn_score, cnn_evaluated) =
        select_best::<B>(dataset, cnn_candidates, options, device)?;
    info!("CNN branch winner: mean CV accuracy {:.2}%", cnn_score * 100.0);

    // LSTM branch against the winning CNN configuration.
    let rnn_candidates = subsample(expand_aggregator(&best_cnn, rnn_grid), options);
    info!("Searching RNN branch: {} candidates", rnn_candidates.len());
    let (best_config, best_score, rnn_evaluated) =
        select_best::<B>(dataset, rnn_candidates, options, device)?;

    info!(
        "Best configuration (mean CV accuracy {:.2}%): filters={} kernel={} units={} lr={}",
        best_score * 100.0,
        best_config.num_filters,
        best_config.kernel_size,
        best_config.num_units,
        best_config.learning_rate
    );

    // Final training on the full training split, class-weighted.
    let sampler = AugmentingSampler::new(
        dataset,
        SamplerConfig {
            batch_size: options.batch_size,
            validation_fraction: options.final_validation_fraction,
            seed: options.seed,
            augment: options.final_augment.clone(),
        },
    )?;
    let class_weights = compute_class_weights(&sampler.train_labels(), &dataset.classes)?;

    B::seed(options.seed);
    let model = CompositeClassifier::<B>::new(&best_config, device);
    let (model, history) = trainer::fit(
        model,
        &best_config,
        &sampler,
        Some(class_weights),
        &TrainOptions {
            epochs: options.final_epochs,
            seed: options.seed,
            early_stop: None,
        },
        device,
    )?;

    let trained = TrainedModel {
        model: model.valid(),
        config: best_config.clone(),
        classes: dataset.classes.clone(),
    };

    let report = SearchReport {
        best_config,
        best_score,
        evaluated: cnn_evaluated + rnn_evaluated,
    };

    Ok((trained, history, report))
}

/// Score candidates in order, keeping the strictly-best (first wins ties)
fn select_best<B: AutodiffBackend>(
    dataset: &MriDataset,
    candidates: Vec<CompositeConfig>,
    options: &SearchOptions,
    device: &B::Device,
) -> Result<(CompositeConfig, f64, usize)> {
    if candidates.is_empty() {
        return Err(NeuroscanError::Config(
            "no valid candidates in the declared grid".to_string(),
        ));
    }

    let mut best: Option<(CompositeConfig, f64)> = None;
    let total = candidates.len();
    for (i, candidate) in candidates.into_iter().enumerate() {
        let score = evaluate_candidate::<B>(dataset, &candidate, options, device)?;
        debug!(
            "Candidate {}/{}: mean accuracy {:.2}% (filters={} kernel={} units={} lr={})",
            i + 1,
            total,
            score * 100.0,
            candidate.num_filters,
            candidate.kernel_size,
            candidate.num_units,
            candidate.learning_rate
        );
        match &best {
            Some((_, best_score)) if score <= *best_score => {}
            _ => best = Some((candidate, score)),
        }
    }

    let (config, score) = best.expect("candidates checked non-empty");
    Ok((config, score, total))
}

fn expand_extractor(base: &CompositeConfig, grid: &ExtractorGrid) -> Vec<CompositeConfig> {
    let mut candidates = Vec::new();
    for &filters in &grid.num_filters {
        for &kernel in &grid.kernel_sizes {
            for &activation in &grid.activations {
                for &pool in &grid.pool_sizes {
                    for &dropout in &grid.dropout_rates {
                        for &lr in &grid.learning_rates {
                            let candidate = base
                                .clone()
                                .with_num_filters(filters)
                                .with_kernel_size(kernel)
                                .with_activation(activation)
                                .with_pool_size(pool)
                                .with_cnn_dropout(dropout)
                                .with_learning_rate(lr);
                            if candidate.validate().is_ok() {
                                candidates.push(candidate);
                            } else {
                                debug!(
                                    "Skipping degenerate candidate: filters={} kernel={} pool={}",
                                    filters, kernel, pool
                                );
                            }
                        }
                    }
                }
            }
        }
    }
    candidates
}

fn expand_aggregator(base: &CompositeConfig, grid: &AggregatorGrid) -> Vec<CompositeConfig> {
    let mut candidates = Vec::new();
    for &units in &grid.num_units {
        for &dropout in &grid.dropout_rates {
            for &lr in &grid.learning_rates {
                let candidate = base
                    .clone()
                    .with_num_units(units)
                    .with_rnn_dropout(dropout)
                    .with_learning_rate(lr);
                if candidate.validate().is_ok() {
                    candidates.push(candidate);
                }
            }
        }
    }
    candidates
}

/// Deterministically subsample the candidate list for randomized search,
/// preserving enumeration order
fn subsample(candidates: Vec<CompositeConfig>, options: &SearchOptions) -> Vec<CompositeConfig> {
    match options.max_candidates {
        Some(max) if candidates.len() > max => {
            let mut picks: Vec<usize> = (0..candidates.len()).collect();
            let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
            picks.shuffle(&mut rng);
            picks.truncate(max);
            picks.sort_unstable();

            let mut chosen = Vec::with_capacity(max);
            let mut iter = picks.into_iter().peekable();
            for (i, candidate) in candidates.into_iter().enumerate() {
                if iter.peek() == Some(&i) {
                    iter.next();
                    chosen.push(candidate);
                }
            }
            chosen
        }
        _ => candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::HeadKind;

    #[test]
    fn test_empty_axis_is_rejected() {
        let grid = ExtractorGrid {
            kernel_sizes: vec![],
            ..Default::default()
        };
        let err = grid.validate().unwrap_err();
        assert!(matches!(
            err,
            NeuroscanError::EmptySearchSpace("cnn.kernel_sizes")
        ));

        let grid = AggregatorGrid {
            num_units: vec![],
            ..Default::default()
        };
        assert!(matches!(
            grid.validate().unwrap_err(),
            NeuroscanError::EmptySearchSpace("rnn.num_units")
        ));
    }

    #[test]
    fn test_expand_is_deterministic_and_complete() {
        let base = CompositeConfig::new(HeadKind::Multiclass { num_classes: 3 })
            .with_input_size(32);
        let grid = ExtractorGrid {
            num_filters: vec![4, 8],
            kernel_sizes: vec![3],
            activations: vec![Activation::Relu],
            pool_sizes: vec![2],
            dropout_rates: vec![0.2],
            learning_rates: vec![1e-3, 1e-2],
        };

        let a = expand_extractor(&base, &grid);
        let b = expand_extractor(&base, &grid);
        assert_eq!(a.len(), 4);
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].num_filters, 4);
        assert_eq!(a[0].learning_rate, 1e-3);
        assert_eq!(a[3].num_filters, 8);
        assert_eq!(a[3].learning_rate, 1e-2);
    }

    #[test]
    fn test_degenerate_candidates_are_skipped() {
        // Kernel of 31 on a 32-wide input leaves a 2-wide map; pool 3
        // collapses it and must be filtered out.
        let base = CompositeConfig::new(HeadKind::Multiclass { num_classes: 3 })
            .with_input_size(32);
        let grid = ExtractorGrid {
            num_filters: vec![4],
            kernel_sizes: vec![31],
            activations: vec![Activation::Relu],
            pool_sizes: vec![2, 3],
            dropout_rates: vec![0.2],
            learning_rates: vec![1e-3],
        };

        let candidates = expand_extractor(&base, &grid);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].pool_size, 2);
    }

    #[test]
    fn test_subsample_is_deterministic() {
        let base = CompositeConfig::new(HeadKind::Multiclass { num_classes: 3 });
        let grid = AggregatorGrid::default();
        let candidates = expand_aggregator(&base, &grid);

        let options = SearchOptions {
            max_candidates: Some(5),
            ..Default::default()
        };
        let a = subsample(candidates.clone(), &options);
        let b = subsample(candidates, &options);

        assert_eq!(a.len(), 5);
        let units_a: Vec<usize> = a.iter().map(|c| c.num_units).collect();
        let units_b: Vec<usize> = b.iter().map(|c| c.num_units).collect();
        assert_eq!(units_a, units_b);
    }
}
