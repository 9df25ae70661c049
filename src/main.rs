//! neuroscan CLI
//!
//! Entry point for training, hyperparameter search, inference, and corpus
//! statistics.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use neuroscan::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use neuroscan::dataset::{
    compute_class_weights, AugmentConfig, AugmentingSampler, MriBatcher, MriDataset, SamplerConfig,
};
use neuroscan::logging::{init_logging, LogConfig};
use neuroscan::metrics::Metrics;
use neuroscan::model::{CompositeClassifier, CompositeConfig, HeadKind, TrainedModel};
use neuroscan::training::{search, trainer, AggregatorGrid, ExtractorGrid, SearchOptions, TrainOptions};
use neuroscan::{Predictor, IMAGE_SIZE};

/// Brain tumor classification with a hybrid CNN+LSTM model
#[derive(Parser, Debug)]
#[command(name = "neuroscan")]
#[command(version)]
#[command(about = "Brain-MRI tumor classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a classifier with fixed hyperparameters
    Train {
        /// Path to the corpus directory (one subdirectory per class)
        #[arg(short, long, default_value = "data/brain_tumors")]
        data_dir: String,

        /// Number of training epochs
        #[arg(short, long, default_value = "50")]
        epochs: usize,

        /// Batch size
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.0001")]
        learning_rate: f64,

        /// Fraction of samples held out for validation
        #[arg(long, default_value = "0.2")]
        validation_fraction: f64,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Disable training-time augmentation
        #[arg(long, default_value = "false")]
        no_augmentation: bool,

        /// Disable class weighting
        #[arg(long, default_value = "false")]
        no_class_weights: bool,

        /// Output directory for the trained model
        #[arg(short, long, default_value = "output/models")]
        output_dir: String,
    },

    /// Cross-validated hyperparameter search, then train the winner
    Search {
        /// Path to the corpus directory
        #[arg(short, long, default_value = "data/brain_tumors")]
        data_dir: String,

        /// Cross-validation fold count
        #[arg(long, default_value = "3")]
        folds: usize,

        /// Epochs per candidate fold
        #[arg(long, default_value = "10")]
        candidate_epochs: usize,

        /// Epochs for the final training run
        #[arg(long, default_value = "50")]
        final_epochs: usize,

        /// Batch size
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Randomized search: cap candidates per branch
        #[arg(long)]
        max_candidates: Option<usize>,

        /// Output directory for the trained model
        #[arg(short, long, default_value = "output/models")]
        output_dir: String,
    },

    /// Run inference on a single image
    Infer {
        /// Path to the input image
        #[arg(short, long)]
        input: String,

        /// Path to the trained model directory
        #[arg(short, long)]
        model: String,
    },

    /// Show corpus statistics
    Stats {
        /// Path to the corpus directory
        #[arg(short, long, default_value = "data/brain_tumors")]
        data_dir: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Train {
            data_dir,
            epochs,
            batch_size,
            learning_rate,
            validation_fraction,
            seed,
            no_augmentation,
            no_class_weights,
            output_dir,
        } => cmd_train(
            &data_dir,
            epochs,
            batch_size,
            learning_rate,
            validation_fraction,
            seed,
            !no_augmentation,
            !no_class_weights,
            &output_dir,
        ),

        Commands::Search {
            data_dir,
            folds,
            candidate_epochs,
            final_epochs,
            batch_size,
            seed,
            max_candidates,
            output_dir,
        } => cmd_search(
            &data_dir,
            folds,
            candidate_epochs,
            final_epochs,
            batch_size,
            seed,
            max_candidates,
            &output_dir,
        ),

        Commands::Infer { input, model } => cmd_infer(&input, &model),

        Commands::Stats { data_dir } => cmd_stats(&data_dir),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_train(
    data_dir: &str,
    epochs: usize,
    batch_size: usize,
    learning_rate: f64,
    validation_fraction: f64,
    seed: u64,
    augmentation: bool,
    class_weighting: bool,
    output_dir: &str,
) -> Result<()> {
    println!("{}", "Loading corpus...".cyan().bold());
    let dataset = MriDataset::from_dir(data_dir, IMAGE_SIZE)?;
    println!("{}", dataset.stats());

    let sampler_config = SamplerConfig {
        batch_size,
        validation_fraction,
        seed,
        augment: if augmentation {
            AugmentConfig::default()
        } else {
            AugmentConfig::none()
        },
    };
    let sampler = AugmentingSampler::new(&dataset, sampler_config)?;

    let class_weights = if class_weighting {
        Some(compute_class_weights(&sampler.train_labels(), &dataset.classes)?)
    } else {
        None
    };

    let config = CompositeConfig::new(HeadKind::Multiclass {
        num_classes: dataset.num_classes(),
    })
    .with_input_size(IMAGE_SIZE)
    .with_learning_rate(learning_rate);
    config.validate()?;

    let device = default_device();
    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Training samples:   {}", sampler.train_len());
    println!("  Validation samples: {}", sampler.val_len());
    println!("  Epochs:             {}", epochs);
    println!("  Batch size:         {}", batch_size);
    println!("  Learning rate:      {}", learning_rate);
    println!("  Augmentation:       {}", augmentation);
    println!("  Backend:            {}", backend_name());
    println!();

    println!("{}", "Starting training...".green().bold());
    use burn::tensor::backend::Backend;
    TrainingBackend::seed(seed);
    let model = CompositeClassifier::<TrainingBackend>::new(&config, &device);
    let options = TrainOptions {
        epochs,
        seed,
        early_stop: None,
    };
    let (model, history) = trainer::fit(
        model,
        &config,
        &sampler,
        class_weights,
        &options,
        &device,
    )?;

    // Detailed validation metrics for the final model.
    use burn::module::AutodiffModule;
    let inner = model.valid();
    let batcher = MriBatcher::new(config.input_size, config.in_channels);
    let inner_device = default_device();
    let (predictions, targets) =
        trainer::predict(&inner, sampler.validation_batches(), &batcher, &inner_device);
    let metrics = Metrics::from_predictions(&predictions, &targets, dataset.num_classes());
    println!();
    println!("{}", "Validation metrics:".cyan().bold());
    println!("{}", metrics);

    let trained = TrainedModel {
        model: inner,
        config,
        classes: dataset.classes.clone(),
    };
    let model_dir = save_with_timestamp(&trained, output_dir)?;

    if let Some(last) = history.last() {
        println!(
            "{} Final validation accuracy: {:.2}%",
            "Done.".green().bold(),
            last.val_accuracy * 100.0
        );
    }
    println!("  Model saved to {:?}", model_dir);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_search(
    data_dir: &str,
    folds: usize,
    candidate_epochs: usize,
    final_epochs: usize,
    batch_size: usize,
    seed: u64,
    max_candidates: Option<usize>,
    output_dir: &str,
) -> Result<()> {
    println!("{}", "Loading corpus...".cyan().bold());
    let dataset = MriDataset::from_dir(data_dir, IMAGE_SIZE)?;
    println!("{}", dataset.stats());

    let base = CompositeConfig::new(HeadKind::Multiclass {
        num_classes: dataset.num_classes(),
    })
    .with_input_size(IMAGE_SIZE);

    let options = SearchOptions {
        folds,
        candidate_epochs,
        final_epochs,
        batch_size,
        seed,
        max_candidates,
        ..Default::default()
    };

    println!();
    println!("{}", "Starting hyperparameter search...".green().bold());
    println!("  Folds:              {}", folds);
    println!("  Candidate epochs:   {}", candidate_epochs);
    println!("  Backend:            {}", backend_name());
    println!();

    let device = default_device();
    let (trained, history, report) = search::run::<TrainingBackend>(
        &dataset,
        &base,
        &ExtractorGrid::default(),
        &AggregatorGrid::default(),
        &options,
        &device,
    )?;

    println!();
    println!("{}", "Search complete.".green().bold());
    println!("  Candidates evaluated: {}", report.evaluated);
    println!(
        "  Best mean CV accuracy: {:.2}%",
        report.best_score * 100.0
    );
    println!(
        "  Winner: filters={} kernel={} pool={} units={} lr={}",
        report.best_config.num_filters,
        report.best_config.kernel_size,
        report.best_config.pool_size,
        report.best_config.num_units,
        report.best_config.learning_rate
    );
    if let Some(last) = history.last() {
        println!(
            "  Final training validation accuracy: {:.2}%",
            last.val_accuracy * 100.0
        );
    }

    let model_dir = save_with_timestamp(&trained, output_dir)?;
    println!("  Model saved to {:?}", model_dir);
    Ok(())
}

fn cmd_infer(input: &str, model_dir: &str) -> Result<()> {
    if !Path::new(input).exists() {
        println!("{} Input not found: {}", "Error:".red(), input);
        return Ok(());
    }

    info!("Loading model from {}", model_dir);
    let device = default_device();
    let predictor = Predictor::<DefaultBackend>::load(Path::new(model_dir), device)?;

    let prediction = predictor.predict_file(Path::new(input))?;
    println!("{}", "Prediction:".cyan().bold());
    println!("  Label:      {}", prediction.label.yellow());
    println!("  Confidence: {:.1}%", prediction.confidence * 100.0);
    if prediction.probabilities.len() > 1 {
        println!("  Distribution:");
        for (idx, p) in prediction.probabilities.iter().enumerate() {
            let name = predictor.classes().decode(idx)?;
            println!("    {:24} {:.1}%", name, p * 100.0);
        }
    }
    Ok(())
}

fn cmd_stats(data_dir: &str) -> Result<()> {
    if !Path::new(data_dir).exists() {
        println!("{} Corpus directory not found: {}", "Error:".red(), data_dir);
        return Ok(());
    }

    let dataset = MriDataset::from_dir(data_dir, IMAGE_SIZE)?;
    println!("{}", dataset.stats());
    Ok(())
}

fn save_with_timestamp(
    trained: &TrainedModel<DefaultBackend>,
    output_dir: &str,
) -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let model_dir = PathBuf::from(output_dir).join(format!("neuroscan_{}", timestamp));
    trained.save(&model_dir)?;
    Ok(model_dir)
}
