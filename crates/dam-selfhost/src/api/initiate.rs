use axum::Json;
use dam_selfhost_api::{InitiateRequestSchema, InitiateResponseSchema};

/// Opens a session. Sessions are not tracked; the id only correlates later predictions.
pub async fn initiate(Json(body): Json<InitiateRequestSchema>) -> Json<InitiateResponseSchema> {
    let session_id = uuid::Uuid::new_v4().simple().to_string();
    log::info!(
        "Initiated session session_id={} user_id={} model_id={}",
        session_id,
        body.user_id,
        body.model_id.as_deref().unwrap_or("-")
    );
    Json(InitiateResponseSchema::new(session_id))
}
