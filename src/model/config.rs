//! Model Configuration
//!
//! The hyperparameter configuration of the composite classifier: the CNN
//! branch axes, the LSTM branch axes, the classification head, and the
//! learning rate. Instances are immutable value types; the search
//! enumerates them from declared grids.

use burn::config::Config;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::NeuroscanError;

/// Supported activation kinds for the CNN branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    /// Apply the activation elementwise
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Relu => burn::tensor::activation::relu(x),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => burn::tensor::activation::sigmoid(x),
        }
    }
}

/// Classification head variant.
///
/// The pipeline trains multi-class over the corpus labels; the binary
/// variant is an explicit opt-in with a single sigmoid output consumed by
/// the thresholding inference boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeadKind {
    /// Softmax distribution over `num_classes` labels
    Multiclass { num_classes: usize },
    /// Single sigmoid probability
    Binary,
}

impl HeadKind {
    /// Width of the final linear layer
    pub fn num_outputs(&self) -> usize {
        match self {
            HeadKind::Multiclass { num_classes } => *num_classes,
            HeadKind::Binary => 1,
        }
    }
}

/// Full hyperparameter configuration of a composite classifier
#[derive(Config, Debug)]
pub struct CompositeConfig {
    /// Classification head variant
    pub head: HeadKind,

    /// Input image side length (square)
    #[config(default = "128")]
    pub input_size: usize,

    /// Number of input channels
    #[config(default = "3")]
    pub in_channels: usize,

    /// Convolution filter count
    #[config(default = "64")]
    pub num_filters: usize,

    /// Convolution kernel side length
    #[config(default = "3")]
    pub kernel_size: usize,

    /// Activation kind for the CNN branch
    #[config(default = "Activation::Relu")]
    pub activation: Activation,

    /// Max-pooling window side length
    #[config(default = "2")]
    pub pool_size: usize,

    /// Dropout rate after the CNN dense layer
    #[config(default = "0.5")]
    pub cnn_dropout: f64,

    /// Width of the per-image embedding
    #[config(default = "128")]
    pub embedding_dim: usize,

    /// Hidden units in each recurrent stage
    #[config(default = "64")]
    pub num_units: usize,

    /// Dropout rate applied to recurrent summaries
    #[config(default = "0.5")]
    pub rnn_dropout: f64,

    /// Dropout rate before the classification head
    #[config(default = "0.5")]
    pub head_dropout: f64,

    /// Adam learning rate
    #[config(default = "1e-4")]
    pub learning_rate: f64,
}

impl CompositeConfig {
    /// Spatial side length after the convolution (valid padding)
    fn conv_dim(&self) -> usize {
        self.input_size.saturating_sub(self.kernel_size) + 1
    }

    /// Flattened feature length after conv + pool, input to the dense layer
    pub fn conv_output_len(&self) -> usize {
        let pooled = self.conv_dim() / self.pool_size;
        self.num_filters * pooled * pooled
    }

    /// Check the configuration for degenerate values before building
    pub fn validate(&self) -> crate::error::Result<()> {
        let fail = |msg: String| Err(NeuroscanError::Config(msg));

        if let HeadKind::Multiclass { num_classes } = self.head {
            if num_classes < 2 {
                return fail(format!("multiclass head needs >= 2 classes, got {}", num_classes));
            }
        }
        if self.num_filters == 0 || self.embedding_dim == 0 || self.num_units == 0 {
            return fail("layer widths must be positive".to_string());
        }
        if self.kernel_size == 0 || self.kernel_size >= self.input_size {
            return fail(format!(
                "kernel size {} invalid for input size {}",
                self.kernel_size, self.input_size
            ));
        }
        if self.pool_size == 0 || self.conv_dim() / self.pool_size == 0 {
            return fail(format!(
                "pool size {} collapses the {}-wide feature map",
                self.pool_size,
                self.conv_dim()
            ));
        }
        for rate in [self.cnn_dropout, self.rnn_dropout, self.head_dropout] {
            if !(0.0..1.0).contains(&rate) {
                return fail(format!("dropout rate {} outside [0, 1)", rate));
            }
        }
        if self.learning_rate <= 0.0 {
            return fail(format!("learning rate {} must be positive", self.learning_rate));
        }
        Ok(())
    }
}
