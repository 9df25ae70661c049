//! Backend selection
//!
//! CPU (ndarray) by default so the full pipeline runs anywhere; the `cuda`
//! feature switches every binary to GPU execution.

use burn::backend::Autodiff;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn::backend::Cuda;

#[cfg(not(feature = "cuda"))]
pub type DefaultBackend = burn::backend::NdArray;

/// The autodiff backend used for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device for the selected backend
pub fn default_device() -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    Default::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }
    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }
}
