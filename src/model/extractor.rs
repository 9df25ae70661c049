//! Feature Extractor (CNN branch)
//!
//! A configurable convolution -> pooling -> flatten -> dense stack that
//! turns one scan into a fixed-length embedding. Deterministic at
//! inference (dropout inactive on the valid backend), stochastic during
//! training.

use burn::{
    module::{Ignored, Module},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    prelude::*,
};

use crate::model::config::{Activation, CompositeConfig};

/// CNN branch producing per-image embeddings
#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    conv: Conv2d<B>,
    pool: MaxPool2d,
    fc: Linear<B>,
    dropout: Dropout,
    activation: Ignored<Activation>,
}

impl<B: Backend> FeatureExtractor<B> {
    /// Build the branch from the composite configuration
    pub fn new(config: &CompositeConfig, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new(
            [config.in_channels, config.num_filters],
            [config.kernel_size, config.kernel_size],
        )
        .init(device);

        let pool = MaxPool2dConfig::new([config.pool_size, config.pool_size])
            .with_strides([config.pool_size, config.pool_size])
            .init();

        let fc = LinearConfig::new(config.conv_output_len(), config.embedding_dim).init(device);
        let dropout = DropoutConfig::new(config.cnn_dropout).init();

        Self {
            conv,
            pool,
            fc,
            dropout,
            activation: Ignored(config.activation),
        }
    }

    /// Embed a batch of scans.
    ///
    /// Input `[batch, channels, height, width]`, output
    /// `[batch, embedding_dim]`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.fc.forward(x);
        let x = self.activation.forward(x);
        self.dropout.forward(x)
    }
}
