use std::path::Path;

use thiserror::Error;

/// Raised when the inference pipeline cannot be constructed.
///
/// The error is cloneable so that every caller waiting on the same construction attempt
/// observes the same failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("DAM pipeline could not be loaded: {0}")]
pub struct PipelineLoadError(pub String);

impl PipelineLoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The pipeline process was terminated by the OS, typically for running out of memory.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("pipeline process was terminated by the OS (exit code {code})")]
pub struct PipelineKilled {
    pub code: i32,
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid base64 audio payload: {0}")]
    Decode(String),
    #[error("audio download failed: {0}")]
    Download(String),
    #[error("could not stage audio: {0}")]
    Staging(String),
    #[error(transparent)]
    PipelineLoad(#[from] PipelineLoadError),
    #[error("DAM prediction timed out after {seconds} seconds")]
    Timeout { seconds: f64 },
    #[error("DAM prediction worker failed: {0}")]
    WorkerFailed(String),
    #[error("DAM prediction worker exited unexpectedly with code {0}")]
    UnexpectedExit(i32),
    #[error("DAM prediction worker returned no result")]
    NoResult,
    #[error("could not start prediction worker: {0}")]
    Spawn(String),
    #[error("in-process inference failed: {0}")]
    Inference(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl PredictionError {
    /// Whether the failure was caused by the caller rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictionError::Validation(_))
    }

    /// Replaces any occurrence of the given local paths in messages that originate from the
    /// pipeline, so that filesystem layout never reaches a client.
    pub fn redact_paths(self, paths: &[&Path]) -> Self {
        let redact = |mut message: String| {
            for path in paths {
                let raw = path.to_string_lossy();
                if !raw.is_empty() {
                    message = message.replace(raw.as_ref(), "<audio>");
                }
            }
            message
        };
        match self {
            PredictionError::WorkerFailed(message) => PredictionError::WorkerFailed(redact(message)),
            PredictionError::Inference(message) => PredictionError::Inference(redact(message)),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn timeout_message_includes_duration() {
        let err = PredictionError::Timeout { seconds: 300.0 };
        assert_eq!(err.to_string(), "DAM prediction timed out after 300 seconds");
    }

    #[test]
    fn only_validation_is_a_client_error() {
        assert!(PredictionError::Validation("missing".into()).is_client_error());
        assert!(!PredictionError::NoResult.is_client_error());
        assert!(!PredictionError::Download("HTTP 404".into()).is_client_error());
    }

    #[test]
    fn pipeline_messages_do_not_leak_staged_paths() {
        let staged = PathBuf::from("/tmp/dam-audio-x1y2.wav");
        let err = PredictionError::WorkerFailed(
            "cannot decode /tmp/dam-audio-x1y2.wav: bad header".to_string(),
        )
        .redact_paths(&[staged.as_path()]);

        assert_eq!(
            err.to_string(),
            "DAM prediction worker failed: cannot decode <audio>: bad header"
        );
    }
}
