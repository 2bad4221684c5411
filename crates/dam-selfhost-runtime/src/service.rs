use std::sync::Arc;

use serde_json::json;

use crate::Result;
use crate::audio::{AudioFetcher, AudioTrimmer};
use crate::config::ServiceConfig;
use crate::error::PredictionError;
use crate::isolation::{Coordinator, IsolatedExecutor, WorkerRequest, WorkerSpawner};
use crate::pipeline::{PipelineCache, PipelineLoader, ResultMap};

const MISSING_AUDIO: &str = "Either audioData or audioFileUrl is required";

/// Where the audio for a request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSource<'a> {
    /// Base64-encoded audio bytes.
    Inline(&'a str),
    /// URL to download the audio from.
    Remote(&'a str),
}

impl AudioSource<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            AudioSource::Inline(_) => "inline",
            AudioSource::Remote(_) => "url",
        }
    }
}

/// One prediction as seen by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub session_id: String,
    pub audio_data: Option<String>,
    pub audio_file_url: Option<String>,
    /// Only used for its extension.
    pub audio_file_name: String,
    /// Advisory.
    pub model_id: Option<String>,
    pub quantized: bool,
}

impl Default for PredictionRequest {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            audio_data: None,
            audio_file_url: None,
            audio_file_name: "audio.wav".to_string(),
            model_id: None,
            quantized: true,
        }
    }
}

impl PredictionRequest {
    /// The audio source to use. Inline data wins when both are present; empty strings count
    /// as absent.
    pub fn source(&self) -> Result<AudioSource<'_>> {
        fn present(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|value| !value.is_empty())
        }

        if let Some(data) = present(&self.audio_data) {
            return Ok(AudioSource::Inline(data));
        }
        if let Some(url) = present(&self.audio_file_url) {
            return Ok(AudioSource::Remote(url));
        }
        Err(PredictionError::Validation(MISSING_AUDIO.to_string()))
    }
}

/// Runs predictions end to end: stage the audio, bound its duration, run the pipeline in
/// isolation and release every staged file before returning.
pub struct PredictionService {
    config: ServiceConfig,
    fetcher: AudioFetcher,
    trimmer: AudioTrimmer,
    coordinator: Coordinator,
}

impl PredictionService {
    pub fn new(
        config: ServiceConfig,
        loader: Arc<dyn PipelineLoader>,
        spawner: Arc<dyn WorkerSpawner>,
    ) -> Result<Self> {
        let fetcher = AudioFetcher::new(config.download_timeout, config.temp_dir.clone())
            .map_err(|err| PredictionError::Configuration(err.to_string()))?;
        let trimmer = AudioTrimmer::new(config.ffmpeg_path.clone(), config.temp_dir.clone());
        let executor = IsolatedExecutor::new(spawner, config.prediction_timeout)
            .with_termination_grace(config.termination_grace)
            .with_start_mode(config.start_mode)
            .with_max_concurrent(config.max_concurrent_workers);
        let coordinator = Coordinator::new(executor, Arc::new(PipelineCache::new(loader)));

        Ok(Self {
            config,
            fetcher,
            trimmer,
            coordinator,
        })
    }

    pub fn pipeline_loaded(&self) -> bool {
        self.coordinator.pipeline().is_loaded()
    }

    /// The fixed result returned in mock mode.
    pub fn mock_result() -> ResultMap {
        let mut result = ResultMap::new();
        result.insert("provider".to_string(), json!("dam-selfhost-mock"));
        result.insert("depression_score".to_string(), json!(0.42));
        result.insert("confidence".to_string(), json!(0.61));
        result.insert(
            "note".to_string(),
            json!("Mock DAM response for local development"),
        );
        result
    }

    pub async fn predict(&self, request: &PredictionRequest) -> Result<ResultMap> {
        let source = request.source()?;
        log::info!(
            "Prediction request session_id={} source={} quantized={} model_id={}",
            request.session_id,
            source.kind(),
            request.quantized,
            request.model_id.as_deref().unwrap_or("-")
        );

        if self.config.mock_mode {
            log::info!("Mock mode enabled; returning mock result session_id={}", request.session_id);
            return Ok(Self::mock_result());
        }

        let acquired = match source {
            AudioSource::Inline(data) => {
                self.fetcher
                    .from_base64(data, &request.audio_file_name)
                    .await?
            }
            AudioSource::Remote(url) => {
                self.fetcher
                    .download(url, &request.audio_file_name)
                    .await?
            }
        };
        let trimmed = self
            .trimmer
            .trim(&acquired, self.config.max_audio_seconds)
            .await;
        let audio = trimmed.as_ref().unwrap_or(&acquired);

        let result = self
            .coordinator
            .run(WorkerRequest::new(audio.path().to_path_buf(), request.quantized))
            .await
            .map_err(|err| err.redact_paths(&[acquired.path(), audio.path()]));

        match &result {
            Ok(_) => log::info!("Prediction completed session_id={}", request.session_id),
            Err(err) => log::error!(
                "Prediction failed session_id={}: {err}",
                request.session_id
            ),
        }
        result
    }

    /// Loads the pipeline ahead of the first request, when configured to.
    ///
    /// A failure is logged and left for the next request to retry.
    pub async fn preload(&self) {
        if self.config.mock_mode {
            log::info!("Mock mode enabled; skipping DAM pipeline preload");
            return;
        }
        if !self.config.preload_on_startup {
            log::info!("DAM pipeline preload disabled; it will load on first use");
            return;
        }

        let pipeline = self.coordinator.pipeline().clone();
        match tokio::task::spawn_blocking(move || pipeline.get_handle()).await {
            Ok(Ok(_)) => log::info!("DAM pipeline preloaded"),
            Ok(Err(err)) => log::error!("DAM pipeline preload failed, the next request will retry: {err}"),
            Err(err) => log::error!("DAM pipeline preload did not complete: {err}"),
        }
    }
}
