use axum::{Json, extract::State};
use dam_selfhost_api::HealthResponseSchema;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponseSchema> {
    Json(HealthResponseSchema::ok(
        state.service.pipeline_loaded().into(),
    ))
}
