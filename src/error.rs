//! Error Taxonomy
//!
//! A single `thiserror` enum covering the crate's failure modes, plus a
//! crate-wide [`Result`] alias. Corpus/image read failures are fatal;
//! schema errors surface at load time; degenerate configuration is
//! reported before any training compute runs.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result type aliased over [`NeuroscanError`].
pub type Result<T> = std::result::Result<T, NeuroscanError>;

/// The complete set of errors surfaced by neuroscan.
#[derive(Error, Debug)]
pub enum NeuroscanError {
    /// Underlying filesystem or I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An image could not be read or decoded.
    #[error("failed to read image {0}: {1}")]
    Image(PathBuf, String),

    /// A class directory contained no usable images.
    #[error("class directory is empty: {0}")]
    EmptyClassDir(PathBuf),

    /// The corpus root held no class subdirectories.
    #[error("no class directories found under {0}")]
    NoClasses(PathBuf),

    /// A label or class index outside the fitted set was requested.
    #[error("unknown label: {0}")]
    UnknownLabel(String),

    /// A class had zero samples when computing balancing weights.
    #[error("class has no samples: {0}")]
    EmptyClass(String),

    /// A hyperparameter search axis had no candidate values.
    #[error("empty search space axis: {0}")]
    EmptySearchSpace(&'static str),

    /// A persisted model artifact was missing or corrupt.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// An invariant on configuration was violated.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A failure arose during the training loop.
    #[error("training error: {0}")]
    Training(String),
}
