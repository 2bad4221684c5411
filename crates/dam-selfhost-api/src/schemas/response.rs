use derive_new::new;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Loaded,
    NotLoaded,
}

impl From<bool> for PipelineState {
    fn from(loaded: bool) -> Self {
        if loaded {
            PipelineState::Loaded
        } else {
            PipelineState::NotLoaded
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponseSchema {
    pub status: String,
    pub pipeline: PipelineState,
}

impl HealthResponseSchema {
    pub fn ok(pipeline: PipelineState) -> Self {
        Self {
            status: "ok".to_string(),
            pipeline,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, new)]
pub struct InitiateResponseSchema {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponseSchema {
    pub session_id: String,
    pub status: String,
    pub provider: String,
    pub model: String,
    pub result: Option<serde_json::Map<String, serde_json::Value>>,
}

impl PredictResponseSchema {
    /// A response for a session that has been accepted but carries no result yet.
    pub fn submitted(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            status: "submitted".to_string(),
            provider: crate::PROVIDER.to_string(),
            model: crate::MODEL.to_string(),
            result: None,
        }
    }

    pub fn completed(
        session_id: impl Into<String>,
        result: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            status: "completed".to_string(),
            result: Some(result),
            ..Self::submitted(session_id)
        }
    }
}

/// Body returned for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, new)]
pub struct ErrorResponseSchema {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, "loaded")]
    #[case(false, "not_loaded")]
    fn health_reports_pipeline_state(#[case] loaded: bool, #[case] expected: &str) {
        let body = serde_json::to_value(HealthResponseSchema::ok(loaded.into())).unwrap();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["pipeline"], expected);
    }

    #[test]
    fn completed_response_carries_provider_and_model() {
        let mut result = serde_json::Map::new();
        result.insert("depression_score".to_string(), 0.3.into());

        let body = serde_json::to_value(PredictResponseSchema::completed("s1", result)).unwrap();

        assert_eq!(body["session_id"], "s1");
        assert_eq!(body["status"], "completed");
        assert_eq!(body["provider"], "dam-selfhost");
        assert_eq!(body["model"], "KintsugiHealth/dam");
        assert_eq!(body["result"]["depression_score"], 0.3);
    }
}
