use std::sync::Arc;

use dam_selfhost_runtime::PredictionService;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
