use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_audio_file_name() -> String {
    "audio.wav".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequestSchema {
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_true")]
    pub is_initiated: bool,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequestSchema {
    pub session_id: String,
    #[serde(default)]
    pub audio_data: Option<String>,
    #[serde(default)]
    pub audio_file_url: Option<String>,
    #[serde(default = "default_audio_file_name")]
    pub audio_file_name: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default = "default_true")]
    pub quantized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_request_applies_defaults() {
        let request: PredictRequestSchema =
            serde_json::from_str(r#"{"sessionId": "abc", "audioData": "AAAA"}"#).unwrap();

        assert_eq!(request.session_id, "abc");
        assert_eq!(request.audio_file_name, "audio.wav");
        assert!(request.quantized);
        assert_eq!(request.model_id, None);
        assert_eq!(request.audio_data.as_deref(), Some("AAAA"));
        assert_eq!(request.audio_file_url, None);
    }

    #[test]
    fn empty_sources_are_kept_verbatim() {
        let request: PredictRequestSchema = serde_json::from_str(
            r#"{"sessionId": "abc", "audioData": "", "audioFileUrl": "", "quantized": false}"#,
        )
        .unwrap();

        assert_eq!(request.audio_data.as_deref(), Some(""));
        assert_eq!(request.audio_file_url.as_deref(), Some(""));
        assert!(!request.quantized);
    }

    #[test]
    fn initiate_request_accepts_empty_body() {
        let request: InitiateRequestSchema = serde_json::from_str("{}").unwrap();

        assert_eq!(request.user_id, "");
        assert!(request.is_initiated);
        assert!(request.metadata.is_none());
    }
}
