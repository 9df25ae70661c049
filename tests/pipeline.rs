//! End-to-end pipeline tests: corpus on disk -> training -> persistence ->
//! prediction, plus hyperparameter search selection on a synthetic grid.

use std::path::PathBuf;

use burn::prelude::*;
use image::{Rgb, RgbImage};
use tempfile::TempDir;

use neuroscan::backend::{DefaultBackend, TrainingBackend};
use neuroscan::dataset::{
    compute_class_weights, AugmentConfig, AugmentingSampler, LabelEncoder, MriDataset, MriSample,
    SamplerConfig,
};
use neuroscan::model::{CompositeClassifier, CompositeConfig, HeadKind, TrainedModel};
use neuroscan::training::{search, trainer, AggregatorGrid, ExtractorGrid, SearchOptions, TrainOptions};
use neuroscan::{Activation, Predictor};

/// Write a 3-class toy corpus of 128x128 RGB images to disk.
///
/// Each class has a distinct base intensity with per-image texture so the
/// signal is learnable but not constant.
fn write_toy_corpus(classes: &[&str], images_per_class: usize) -> TempDir {
    let root = TempDir::new().unwrap();
    for (class_idx, class) in classes.iter().enumerate() {
        let dir = root.path().join(class);
        std::fs::create_dir(&dir).unwrap();
        for i in 0..images_per_class {
            let base = 40 + 80 * class_idx as u32;
            let img = RgbImage::from_fn(128, 128, |x, y| {
                let texture = (x.wrapping_mul(7) ^ y.wrapping_mul(13) ^ (i as u32 * 31)) % 32;
                let v = (base + texture).min(255) as u8;
                Rgb([v, v, v])
            });
            img.save(dir.join(format!("{}.png", i + 1))).unwrap();
        }
    }
    root
}

fn small_config(num_classes: usize) -> CompositeConfig {
    CompositeConfig::new(HeadKind::Multiclass { num_classes })
        .with_input_size(128)
        .with_num_filters(8)
        .with_embedding_dim(16)
        .with_num_units(8)
        .with_cnn_dropout(0.1)
        .with_rnn_dropout(0.1)
        .with_head_dropout(0.1)
        .with_learning_rate(1e-3)
}

#[test]
fn end_to_end_train_save_predict() {
    let classes = ["glioma", "meningioma", "pituitary"];
    let corpus = write_toy_corpus(&classes, 10);

    let dataset = MriDataset::from_dir(corpus.path(), 128).unwrap();
    assert_eq!(dataset.len(), 30);
    assert_eq!(dataset.num_classes(), 3);

    let sampler = AugmentingSampler::new(
        &dataset,
        SamplerConfig {
            batch_size: 4,
            validation_fraction: 0.2,
            seed: 42,
            augment: AugmentConfig::none(),
        },
    )
    .unwrap();
    assert_eq!(sampler.val_len(), 6);
    assert_eq!(sampler.train_len(), 24);

    let class_weights = compute_class_weights(&sampler.train_labels(), &dataset.classes).unwrap();

    let config = small_config(3);
    let device = Default::default();
    TrainingBackend::seed(42);
    let model = CompositeClassifier::<TrainingBackend>::new(&config, &device);

    let options = TrainOptions {
        epochs: 2,
        seed: 42,
        early_stop: None,
    };
    let (model, history) = trainer::fit(
        model,
        &config,
        &sampler,
        Some(class_weights),
        &options,
        &device,
    )
    .unwrap();

    assert_eq!(history.len(), 2);
    for epoch in &history {
        assert!((0.0..=1.0).contains(&epoch.val_accuracy));
        assert!((0.0..=1.0).contains(&epoch.train_accuracy));
        assert!(epoch.train_loss.is_finite());
        assert!(epoch.val_loss.is_finite());
    }

    // Persist and reload, then predict corpus images through the service
    // boundary.
    use burn::module::AutodiffModule;
    let trained = TrainedModel {
        model: model.valid(),
        config,
        classes: dataset.classes.clone(),
    };
    let model_dir = TempDir::new().unwrap();
    trained.save(model_dir.path()).unwrap();

    let inference_device = Default::default();
    let predictor =
        Predictor::<DefaultBackend>::load(model_dir.path(), inference_device).unwrap();

    for sample in dataset.samples.iter().step_by(7) {
        let prediction = predictor.predict_file(&sample.path).unwrap();
        assert!(
            classes.contains(&prediction.label.as_str()),
            "predicted unknown label {}",
            prediction.label
        );
        assert!((0.0..=1.0).contains(&prediction.confidence));
        let sum: f32 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }
}

/// In-memory dataset where the two classes differ by mean intensity.
fn separable_dataset(n: usize, image_size: usize) -> MriDataset {
    let classes = LabelEncoder::fit(["signal", "noise"]);
    let samples = (0..n)
        .map(|i| {
            let positive = i % 2 == 0;
            let base = if positive { 0.8 } else { 0.2 };
            let pixels = (0..3 * image_size * image_size)
                .map(|j| base + 0.05 * ((i * 131 + j * 17) % 7) as f32 / 7.0)
                .collect();
            MriSample {
                pixels,
                label: usize::from(!positive),
                class_name: if positive { "signal" } else { "noise" }.to_string(),
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

#[test]
fn search_selects_the_higher_scoring_candidate() {
    let dataset = separable_dataset(16, 8);

    let base = CompositeConfig::new(HeadKind::Multiclass { num_classes: 2 })
        .with_input_size(8)
        .with_num_filters(4)
        .with_embedding_dim(8)
        .with_num_units(6)
        .with_cnn_dropout(0.0)
        .with_rnn_dropout(0.0)
        .with_head_dropout(0.0);

    // Single-valued CNN axes; the RNN axis pits a frozen learning rate
    // against a workable one.
    let cnn_grid = ExtractorGrid {
        num_filters: vec![4],
        kernel_sizes: vec![3],
        activations: vec![Activation::Relu],
        pool_sizes: vec![2],
        dropout_rates: vec![0.0],
        learning_rates: vec![1e-2],
    };
    let rnn_grid = AggregatorGrid {
        num_units: vec![6],
        dropout_rates: vec![0.0],
        learning_rates: vec![1e-9, 1e-2],
    };

    let options = SearchOptions {
        folds: 2,
        candidate_epochs: 4,
        final_epochs: 2,
        batch_size: 4,
        seed: 42,
        max_candidates: None,
        final_validation_fraction: 0.25,
        final_augment: AugmentConfig::none(),
    };

    let device = Default::default();

    // Score both composed candidates directly; the search must agree with
    // the first-wins argmax of these scores.
    let candidate_frozen = base.clone().with_learning_rate(1e-9);
    let candidate_live = base.clone().with_learning_rate(1e-2);
    let score_frozen =
        search::evaluate_candidate::<TrainingBackend>(&dataset, &candidate_frozen, &options, &device)
            .unwrap();
    let score_live =
        search::evaluate_candidate::<TrainingBackend>(&dataset, &candidate_live, &options, &device)
            .unwrap();

    let expected_lr = if score_live > score_frozen { 1e-2 } else { 1e-9 };

    let (trained, history, report) = search::run::<TrainingBackend>(
        &dataset,
        &base,
        &cnn_grid,
        &rnn_grid,
        &options,
        &device,
    )
    .unwrap();

    assert_eq!(report.evaluated, 3); // 1 CNN candidate + 2 RNN candidates
    assert_eq!(report.best_config.learning_rate, expected_lr);
    assert!((0.0..=1.0).contains(&report.best_score));
    assert!((0.0..=1.0).contains(&score_frozen));
    assert!((0.0..=1.0).contains(&score_live));
    assert!(!history.is_empty());
    assert_eq!(trained.classes, dataset.classes);
}

#[test]
fn search_rejects_empty_axes_before_training() {
    let dataset = separable_dataset(8, 8);
    let base = CompositeConfig::new(HeadKind::Multiclass { num_classes: 2 }).with_input_size(8);

    let empty_grid = ExtractorGrid {
        learning_rates: vec![],
        ..Default::default()
    };

    let device = Default::default();
    let err = search::run::<TrainingBackend>(
        &dataset,
        &base,
        &empty_grid,
        &AggregatorGrid::default(),
        &SearchOptions::default(),
        &device,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        neuroscan::NeuroscanError::EmptySearchSpace("cnn.learning_rates")
    ));
}
