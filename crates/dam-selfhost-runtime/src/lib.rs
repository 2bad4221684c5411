//! DAM self-hosted prediction runtime
//!
//! This crate runs speech-based depression inference behind a process isolation boundary.
//! Each prediction is executed in a disposable worker process so that a crash or a memory
//! blowout inside the third-party pipeline cannot take the serving process down with it.
//!
//! The request path is:
//! 1. [`audio::AudioFetcher`] stages the caller's audio as a temporary file.
//! 2. [`audio::AudioTrimmer`] bounds its duration with an external transcoder.
//! 3. [`isolation::Coordinator`] runs the pipeline in a worker, falling back to in-process
//!    execution when the OS kills the worker for memory reasons.
//! 4. [`service::PredictionService`] ties the steps together and releases every staged file.

pub mod audio;
pub mod config;
pub mod error;
pub mod isolation;
pub mod pipeline;
pub mod service;

pub use config::{ServiceConfig, StartMode};
pub use error::{PipelineKilled, PipelineLoadError, PredictionError};
pub use isolation::{
    Coordinator, ExecutableSpawner, IsolatedExecutor, WorkerMessage, WorkerOutcome,
    WorkerRequest, WorkerSpawner,
};
pub use pipeline::{
    CommandPipelineConfig, Pipeline, PipelineCache, PipelineHandle, PipelineLoader, ResultMap,
};
pub use service::{AudioSource, PredictionRequest, PredictionService};

/// Result type commonly used throughout the runtime
pub type Result<T> = std::result::Result<T, PredictionError>;
