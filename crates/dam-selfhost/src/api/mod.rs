use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

mod health;
mod initiate;
mod predict;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/initiate", post(initiate::initiate))
        .route("/predict", post(predict::predict))
        .with_state(state)
}
