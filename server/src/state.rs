//! Shared server state: the loaded predictor.

use neuroscan::backend::DefaultBackend;
use neuroscan::Predictor;

pub struct AppState {
    pub predictor: Predictor<DefaultBackend>,
}

impl AppState {
    pub fn new(predictor: Predictor<DefaultBackend>) -> Self {
        Self { predictor }
    }
}
