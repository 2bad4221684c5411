use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use reqwest::redirect::Policy;

use super::staging::StagedAudio;
use crate::error::PredictionError;

const RECOGNIZED_EXTENSIONS: &[&str] = &[
    "wav", "mp3", "m4a", "mp4", "ogg", "oga", "opus", "flac", "aac", "webm", "wma", "aiff",
];

/// Derives the staged file suffix from a caller-supplied file name.
///
/// Unknown or missing extensions map to `.wav`.
pub fn suffix_for(filename_hint: &str) -> String {
    Path::new(filename_hint)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| RECOGNIZED_EXTENSIONS.contains(&ext.as_str()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".wav".to_string())
}

/// Stages request audio on local disk, from an inline payload or a remote URL.
#[derive(Debug, Clone)]
pub struct AudioFetcher {
    client: reqwest::Client,
    temp_dir: Option<PathBuf>,
}

impl AudioFetcher {
    pub fn new(download_timeout: Duration, temp_dir: Option<PathBuf>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(download_timeout)
            .redirect(Policy::limited(10))
            .build()?;
        Ok(Self { client, temp_dir })
    }

    /// Decodes a base64 payload into a new staged file.
    pub async fn from_base64(
        &self,
        data: &str,
        filename_hint: &str,
    ) -> Result<StagedAudio, PredictionError> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|err| PredictionError::Decode(err.to_string()))?;

        let staged = self.stage(&raw, filename_hint).await?;
        log::info!(
            "Decoded base64 audio to temp file: path={} bytes={}",
            staged.path().display(),
            raw.len()
        );
        Ok(staged)
    }

    /// Downloads remote audio into a new staged file.
    pub async fn download(
        &self,
        url: &str,
        filename_hint: &str,
    ) -> Result<StagedAudio, PredictionError> {
        log::info!("Downloading audio from URL: {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| PredictionError::Download(describe_download_error(&err)))?;
        let body = response
            .bytes()
            .await
            .map_err(|err| PredictionError::Download(describe_download_error(&err)))?;

        let staged = self.stage(&body, filename_hint).await?;
        log::info!(
            "Downloaded audio to temp file: path={} bytes={}",
            staged.path().display(),
            body.len()
        );
        Ok(staged)
    }

    async fn stage(&self, bytes: &[u8], filename_hint: &str) -> Result<StagedAudio, PredictionError> {
        let staged = StagedAudio::create(self.temp_dir.as_deref(), &suffix_for(filename_hint))
            .map_err(|err| PredictionError::Staging(err.to_string()))?;
        tokio::fs::write(staged.path(), bytes)
            .await
            .map_err(|err| PredictionError::Staging(err.to_string()))?;
        Ok(staged)
    }
}

/// A client-safe description of a download failure, without the URL.
fn describe_download_error(err: &reqwest::Error) -> String {
    if let Some(status) = err.status() {
        format!("remote server responded with HTTP {}", status.as_u16())
    } else if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "could not connect to the remote host".to_string()
    } else if err.is_redirect() {
        "too many redirects".to_string()
    } else if err.is_builder() {
        "invalid audio URL".to_string()
    } else {
        "network error while fetching audio".to_string()
    }
}
