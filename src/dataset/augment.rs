//! Augmenting Sampler
//!
//! Wraps a loaded corpus with a deterministic train/validation split and
//! produces shuffled mini-batches. Training batches receive randomized
//! geometric transforms sampled independently per image per epoch;
//! validation batches see only the loader's resize/normalize pipeline.
//! Everything is reproducible under a fixed seed.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::batcher::MriItem;
use crate::dataset::loader::MriDataset;
use crate::error::{NeuroscanError, Result};

/// Randomized transform ranges, mirroring the training data generator of
/// the original experiments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Maximum rotation in degrees, sampled from [-range, range]
    pub rotation_range: f32,
    /// Horizontal shift as a fraction of width, sampled from [-f, f]
    pub width_shift: f32,
    /// Vertical shift as a fraction of height, sampled from [-f, f]
    pub height_shift: f32,
    /// Maximum shear angle in degrees, sampled from [-range, range]
    pub shear_range: f32,
    /// Zoom delta, scale sampled from [1 - z, 1 + z]
    pub zoom_range: f32,
    /// Random horizontal flip with probability 0.5
    pub horizontal_flip: bool,
    /// Random vertical flip with probability 0.5
    pub vertical_flip: bool,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            rotation_range: 20.0,
            width_shift: 0.2,
            height_shift: 0.2,
            shear_range: 0.2,
            zoom_range: 0.2,
            horizontal_flip: true,
            vertical_flip: true,
        }
    }
}

impl AugmentConfig {
    /// Identity configuration: no transform is ever applied
    pub fn none() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift: 0.0,
            height_shift: 0.0,
            shear_range: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
            vertical_flip: false,
        }
    }

    fn is_identity(&self) -> bool {
        self.rotation_range == 0.0
            && self.width_shift == 0.0
            && self.height_shift == 0.0
            && self.shear_range == 0.0
            && self.zoom_range == 0.0
            && !self.horizontal_flip
            && !self.vertical_flip
    }
}

/// Sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Mini-batch size
    pub batch_size: usize,
    /// Fraction of samples held out for validation
    pub validation_fraction: f64,
    /// Seed for the split, epoch shuffles, and transform sampling
    pub seed: u64,
    /// Transform ranges for training batches
    pub augment: AugmentConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            validation_fraction: 0.2,
            seed: 42,
            augment: AugmentConfig::default(),
        }
    }
}

/// Deterministic train/validation sampler over an in-memory corpus
pub struct AugmentingSampler<'a> {
    dataset: &'a MriDataset,
    config: SamplerConfig,
    train_indices: Vec<usize>,
    val_indices: Vec<usize>,
}

impl<'a> AugmentingSampler<'a> {
    /// Split the corpus and build a sampler.
    ///
    /// The split is a seeded shuffle: the first `round(n * fraction)`
    /// indices become the validation subset, the rest the training subset.
    /// Subset membership is stable across runs for the same seed and
    /// corpus order.
    pub fn new(dataset: &'a MriDataset, config: SamplerConfig) -> Result<Self> {
        if !(0.0..1.0).contains(&config.validation_fraction) {
            return Err(NeuroscanError::Config(
                "validation_fraction must be in [0, 1)".to_string(),
            ));
        }
        if config.batch_size == 0 {
            return Err(NeuroscanError::Config("batch_size must be positive".to_string()));
        }

        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        indices.shuffle(&mut rng);

        let n_val = (dataset.len() as f64 * config.validation_fraction).round() as usize;
        let val_indices = indices[..n_val].to_vec();
        let train_indices = indices[n_val..].to_vec();

        debug!(
            "Split corpus: {} train / {} validation (fraction {})",
            train_indices.len(),
            val_indices.len(),
            config.validation_fraction
        );

        Ok(Self {
            dataset,
            config,
            train_indices,
            val_indices,
        })
    }

    /// Build a sampler from explicit index sets (cross-validation folds)
    pub fn from_indices(
        dataset: &'a MriDataset,
        train_indices: Vec<usize>,
        val_indices: Vec<usize>,
        config: SamplerConfig,
    ) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(NeuroscanError::Config("batch_size must be positive".to_string()));
        }
        Ok(Self {
            dataset,
            config,
            train_indices,
            val_indices,
        })
    }

    /// Number of training samples
    pub fn train_len(&self) -> usize {
        self.train_indices.len()
    }

    /// Number of validation samples
    pub fn val_len(&self) -> usize {
        self.val_indices.len()
    }

    /// Training subset indices (stable across epochs)
    pub fn train_indices(&self) -> &[usize] {
        &self.train_indices
    }

    /// Validation subset indices
    pub fn val_indices(&self) -> &[usize] {
        &self.val_indices
    }

    /// Class labels of the training subset, for class weighting
    pub fn train_labels(&self) -> Vec<usize> {
        self.train_indices
            .iter()
            .map(|&i| self.dataset.samples[i].label)
            .collect()
    }

    /// Lazy sequence of augmented, shuffled training batches for one epoch.
    ///
    /// The shuffle order and every transform parameter derive from
    /// `(seed, epoch)`, so re-running an epoch reproduces it exactly.
    pub fn train_batches(&self, epoch: usize) -> BatchIter<'_> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(epoch as u64 + 1));
        let mut order = self.train_indices.clone();
        order.shuffle(&mut rng);

        BatchIter {
            dataset: self.dataset,
            order,
            cursor: 0,
            batch_size: self.config.batch_size,
            augment: Some((self.config.augment.clone(), rng)),
        }
    }

    /// Lazy sequence of validation batches: stable order, no augmentation
    pub fn validation_batches(&self) -> BatchIter<'_> {
        BatchIter {
            dataset: self.dataset,
            order: self.val_indices.clone(),
            cursor: 0,
            batch_size: self.config.batch_size,
            augment: None,
        }
    }
}

/// Restartable, finite iterator of item batches
pub struct BatchIter<'a> {
    dataset: &'a MriDataset,
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    augment: Option<(AugmentConfig, ChaCha8Rng)>,
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = Vec<MriItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let mut items = Vec::with_capacity(end - self.cursor);

        for &idx in &self.order[self.cursor..end] {
            let sample = &self.dataset.samples[idx];
            let image = match &mut self.augment {
                Some((config, rng)) if !config.is_identity() => {
                    let params = TransformParams::sample(config, rng);
                    warp(
                        &sample.pixels,
                        self.dataset.channels,
                        self.dataset.image_size,
                        self.dataset.image_size,
                        &params,
                    )
                }
                _ => sample.pixels.clone(),
            };
            items.push(MriItem {
                image,
                label: sample.label,
            });
        }

        self.cursor = end;
        Some(items)
    }
}

/// One image's concrete transform, drawn from the configured ranges
#[derive(Debug, Clone, Copy, PartialEq)]
struct TransformParams {
    angle_rad: f32,
    shear_rad: f32,
    zoom: f32,
    shift_x: f32,
    shift_y: f32,
    flip_h: bool,
    flip_v: bool,
}

impl TransformParams {
    fn sample(config: &AugmentConfig, rng: &mut ChaCha8Rng) -> Self {
        let range = |rng: &mut ChaCha8Rng, r: f32| {
            if r > 0.0 {
                rng.gen_range(-r..=r)
            } else {
                0.0
            }
        };

        let angle_rad = range(rng, config.rotation_range).to_radians();
        let shear_rad = range(rng, config.shear_range).to_radians();
        let zoom = if config.zoom_range > 0.0 {
            rng.gen_range(1.0 - config.zoom_range..=1.0 + config.zoom_range)
        } else {
            1.0
        };
        let shift_x = range(rng, config.width_shift);
        let shift_y = range(rng, config.height_shift);
        let flip_h = config.horizontal_flip && rng.gen_bool(0.5);
        let flip_v = config.vertical_flip && rng.gen_bool(0.5);

        Self {
            angle_rad,
            shear_rad,
            zoom,
            shift_x,
            shift_y,
            flip_h,
            flip_v,
        }
    }
}

/// Apply one affine transform to a CHW pixel buffer.
///
/// Rotation, shear, zoom, and flips compose into a single 2x2 matrix about
/// the image center; shifts translate afterwards. Sampling is bilinear
/// with nearest-edge fill for coordinates landing outside the image.
fn warp(pixels: &[f32], channels: usize, height: usize, width: usize, p: &TransformParams) -> Vec<f32> {
    let (sin_t, cos_t) = p.angle_rad.sin_cos();
    let zx = if p.flip_h { -p.zoom } else { p.zoom };
    let zy = if p.flip_v { -p.zoom } else { p.zoom };

    // A = R(theta) * Shear(s) * Zoom, mapping source -> destination
    let a = cos_t * zx;
    let b = (-p.angle_rad - p.shear_rad).sin() * zy;
    let c = sin_t * zx;
    let d = (p.angle_rad + p.shear_rad).cos() * zy;

    let det = a * d - b * c;
    let inv = if det.abs() < 1e-8 {
        [1.0, 0.0, 0.0, 1.0]
    } else {
        [d / det, -b / det, -c / det, a / det]
    };

    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let tx = p.shift_x * width as f32;
    let ty = p.shift_y * height as f32;

    let plane = height * width;
    let mut out = vec![0.0f32; pixels.len()];

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx - tx;
            let dy = y as f32 - cy - ty;
            let sx = (inv[0] * dx + inv[1] * dy + cx).clamp(0.0, width as f32 - 1.0);
            let sy = (inv[2] * dx + inv[3] * dy + cy).clamp(0.0, height as f32 - 1.0);

            let x0 = sx.floor() as usize;
            let y0 = sy.floor() as usize;
            let x1 = (x0 + 1).min(width - 1);
            let y1 = (y0 + 1).min(height - 1);
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            for ch in 0..channels {
                let base = ch * plane;
                let top = pixels[base + y0 * width + x0] * (1.0 - fx)
                    + pixels[base + y0 * width + x1] * fx;
                let bottom = pixels[base + y1 * width + x0] * (1.0 - fx)
                    + pixels[base + y1 * width + x1] * fx;
                out[base + y * width + x] = top * (1.0 - fy) + bottom * fy;
            }
        }
    }

    out
}
