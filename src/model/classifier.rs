//! Composite Classifier
//!
//! The trainable unit: one feature extractor applied to every timestep of
//! a scan sequence (the same weights reused per step), a recurrent stage
//! producing per-step summaries, a second recurrent stage reducing to a
//! single summary, dropout, and a linear classification head.

use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{sigmoid, softmax},
};

use crate::model::aggregator::SequenceAggregator;
use crate::model::config::CompositeConfig;
use crate::model::extractor::FeatureExtractor;

/// Hybrid CNN+LSTM classifier over scan sequences
#[derive(Module, Debug)]
pub struct CompositeClassifier<B: Backend> {
    extractor: FeatureExtractor<B>,
    step_aggregator: SequenceAggregator<B>,
    final_aggregator: SequenceAggregator<B>,
    dropout: Dropout,
    head: Linear<B>,
    num_outputs: usize,
}

impl<B: Backend> CompositeClassifier<B> {
    /// Build the composite from its configuration
    pub fn new(config: &CompositeConfig, device: &B::Device) -> Self {
        let extractor = FeatureExtractor::new(config, device);
        let step_aggregator = SequenceAggregator::new(
            config.embedding_dim,
            config.num_units,
            config.rnn_dropout,
            device,
        );
        let final_aggregator =
            SequenceAggregator::new(config.num_units, config.num_units, config.rnn_dropout, device);
        let dropout = DropoutConfig::new(config.head_dropout).init();
        let head = LinearConfig::new(config.num_units, config.head.num_outputs()).init(device);

        Self {
            extractor,
            step_aggregator,
            final_aggregator,
            dropout,
            head,
            num_outputs: config.head.num_outputs(),
        }
    }

    /// Whether this model carries the single-sigmoid binary head
    pub fn is_binary(&self) -> bool {
        self.num_outputs == 1
    }

    /// Width of the output layer (1 for the binary head)
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Forward pass producing logits.
    ///
    /// Input `[batch, seq, channels, height, width]`; the extractor runs
    /// once per sequence position with shared parameters. Output
    /// `[batch, num_classes]` (or `[batch, 1]` for the binary head).
    /// A sequence of length 1 takes the same path as any other length.
    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 2> {
        let [_, seq_len, _, _, _] = x.dims();

        let embeddings: Vec<Tensor<B, 2>> = (0..seq_len)
            .map(|t| {
                let frame = x.clone().narrow(1, t, 1).squeeze::<4>(1);
                self.extractor.forward(frame)
            })
            .collect();
        let sequence: Tensor<B, 3> = Tensor::stack(embeddings, 1);

        let steps = self.step_aggregator.forward_sequence(sequence);
        let summary = self.final_aggregator.forward_final(steps);

        let summary = self.dropout.forward(summary);
        self.head.forward(summary)
    }

    /// Forward pass producing probabilities: a softmax distribution for
    /// the multi-class head, a sigmoid probability for the binary head
    pub fn forward_probs(&self, x: Tensor<B, 5>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        if self.is_binary() {
            sigmoid(logits)
        } else {
            softmax(logits, 1)
        }
    }
}
