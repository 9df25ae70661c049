//! Batch Assembly
//!
//! Converts sampled items into Burn tensors. Each example is a sequence of
//! scans; the corpus carries one scan per example, so batches have a
//! sequence dimension of length 1 that the model treats like any other.

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;

/// A single sampled scan ready for batching
#[derive(Clone, Debug)]
pub struct MriItem {
    /// Flattened CHW pixel data in [0, 1]
    pub image: Vec<f32>,
    /// Class label index
    pub label: usize,
}

/// A batch of scan sequences for training or evaluation
#[derive(Clone, Debug)]
pub struct MriBatch<B: Backend> {
    /// Images with shape [batch, seq_len, channels, height, width]
    pub images: Tensor<B, 5>,
    /// Labels with shape [batch]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher assembling [batch, 1, C, H, W] sequence tensors
#[derive(Clone, Debug)]
pub struct MriBatcher {
    image_size: usize,
    channels: usize,
}

impl MriBatcher {
    pub fn new(image_size: usize, channels: usize) -> Self {
        Self {
            image_size,
            channels,
        }
    }
}

impl<B: Backend> Batcher<B, MriItem, MriBatch<B>> for MriBatcher {
    fn batch(&self, items: Vec<MriItem>, device: &B::Device) -> MriBatch<B> {
        let batch_size = items.len();
        let (channels, height, width) = (self.channels, self.image_size, self.image_size);

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 5>::from_floats(
            TensorData::new(images_data, [batch_size, 1, channels, height, width]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        MriBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    #[test]
    fn test_batch_shapes() {
        let batcher = MriBatcher::new(8, 3);
        let items: Vec<MriItem> = (0..4)
            .map(|i| MriItem {
                image: vec![0.5; 3 * 8 * 8],
                label: i % 2,
            })
            .collect();

        let device = Default::default();
        let batch: MriBatch<DefaultBackend> = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [4, 1, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [4]);
    }

    #[test]
    fn test_targets_preserved() {
        let batcher = MriBatcher::new(4, 3);
        let items: Vec<MriItem> = vec![
            MriItem {
                image: vec![0.0; 3 * 4 * 4],
                label: 2,
            },
            MriItem {
                image: vec![1.0; 3 * 4 * 4],
                label: 0,
            },
        ];

        let device = Default::default();
        let batch: MriBatch<DefaultBackend> = batcher.batch(items, &device);
        let targets: Vec<i64> = batch.targets.into_data().to_vec().unwrap();
        assert_eq!(targets, vec![2, 0]);
    }
}
