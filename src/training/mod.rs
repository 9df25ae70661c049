//! Training: the epoch-bounded loop and the cross-validated
//! hyperparameter search that drives it.

pub mod search;
pub mod trainer;

pub use search::{AggregatorGrid, ExtractorGrid, SearchOptions, SearchReport};
pub use trainer::{EarlyStopping, EpochMetrics, TrainOptions};
