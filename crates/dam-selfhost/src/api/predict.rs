use axum::{Json, extract::State};
use dam_selfhost_api::{PredictRequestSchema, PredictResponseSchema};
use dam_selfhost_runtime::PredictionRequest;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn predict(
    State(state): State<AppState>,
    Json(body): Json<PredictRequestSchema>,
) -> Result<Json<PredictResponseSchema>, ApiError> {
    let request = prediction_request(body);
    let service = state.service.clone();

    // Detached so that a client disconnect does not abort an in-flight prediction.
    let task = tokio::spawn(async move {
        let result = service.predict(&request).await;
        (request.session_id, result)
    });
    let (session_id, result) = task
        .await
        .map_err(|err| ApiError::internal(format!("DAM prediction failed: {err}")))?;

    Ok(Json(PredictResponseSchema::completed(session_id, result?)))
}

fn prediction_request(body: PredictRequestSchema) -> PredictionRequest {
    PredictionRequest {
        session_id: body.session_id,
        audio_data: body.audio_data,
        audio_file_url: body.audio_file_url,
        audio_file_name: body.audio_file_name,
        model_id: body.model_id,
        quantized: body.quantized,
    }
}
