//! Sequence Aggregator (RNN branch)
//!
//! A recurrent stack consuming an ordered sequence of embeddings and
//! producing either per-step summaries or a single final summary. The
//! recurrent state lives only across the sequence dimension and is reset
//! on every call.

use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Lstm, LstmConfig},
    prelude::*,
};

/// LSTM branch summarizing embedding sequences
#[derive(Module, Debug)]
pub struct SequenceAggregator<B: Backend> {
    lstm: Lstm<B>,
    dropout: Dropout,
}

impl<B: Backend> SequenceAggregator<B> {
    pub fn new(input_dim: usize, num_units: usize, dropout_rate: f64, device: &B::Device) -> Self {
        let lstm = LstmConfig::new(input_dim, num_units, true).init(device);
        let dropout = DropoutConfig::new(dropout_rate).init();
        Self { lstm, dropout }
    }

    /// Per-step summaries: `[batch, seq, input]` -> `[batch, seq, units]`
    pub fn forward_sequence(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let (output, _state) = self.lstm.forward(x, None);
        self.dropout.forward(output)
    }

    /// Final summary only: `[batch, seq, input]` -> `[batch, units]`
    pub fn forward_final(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let (_output, state) = self.lstm.forward(x, None);
        self.dropout.forward(state.hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    #[test]
    fn test_sequence_output_shape() {
        let device = Default::default();
        let aggregator = SequenceAggregator::<DefaultBackend>::new(8, 16, 0.0, &device);

        let input = Tensor::<DefaultBackend, 3>::zeros([2, 5, 8], &device);
        assert_eq!(aggregator.forward_sequence(input).dims(), [2, 5, 16]);
    }

    #[test]
    fn test_final_output_shape() {
        let device = Default::default();
        let aggregator = SequenceAggregator::<DefaultBackend>::new(8, 16, 0.0, &device);

        let input = Tensor::<DefaultBackend, 3>::zeros([3, 5, 8], &device);
        assert_eq!(aggregator.forward_final(input).dims(), [3, 16]);
    }

    #[test]
    fn test_length_one_sequence_is_well_defined() {
        let device = Default::default();
        let aggregator = SequenceAggregator::<DefaultBackend>::new(4, 6, 0.0, &device);

        let input = Tensor::<DefaultBackend, 3>::ones([2, 1, 4], &device);
        let summary = aggregator.forward_final(input);
        assert_eq!(summary.dims(), [2, 6]);

        let values: Vec<f32> = summary.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
    }
}
