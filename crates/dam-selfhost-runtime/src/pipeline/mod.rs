//! The inference pipeline seen from the service: an opaque, expensive-to-load object that
//! turns an audio file into a result mapping.

mod cache;
mod command;

use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;

use derive_more::Deref;
use serde_json::Value;

use crate::error::PipelineLoadError;

pub use cache::PipelineCache;
pub use command::{CommandPipeline, CommandPipelineConfig};

/// Key/value result returned by the pipeline.
pub type ResultMap = serde_json::Map<String, Value>;

/// A loaded inference pipeline.
///
/// Implementations are immutable once constructed and may be called concurrently.
pub trait Pipeline: Send + Sync + 'static {
    /// Runs inference on the audio file at `audio_path`.
    fn run(&self, audio_path: &Path, quantized: bool) -> anyhow::Result<Value>;
}

/// Constructs pipelines. Construction is expected to be slow and may fail.
pub trait PipelineLoader: Send + Sync + 'static {
    fn load(&self) -> Result<PipelineHandle, PipelineLoadError>;
}

impl<F> PipelineLoader for F
where
    F: Fn() -> Result<PipelineHandle, PipelineLoadError> + Send + Sync + 'static,
{
    fn load(&self) -> Result<PipelineHandle, PipelineLoadError> {
        self()
    }
}

/// Shared, cheaply cloneable reference to a loaded pipeline.
#[derive(Clone, Deref)]
pub struct PipelineHandle(Arc<dyn Pipeline>);

impl PipelineHandle {
    pub fn new<P: Pipeline>(pipeline: P) -> Self {
        Self(Arc::new(pipeline))
    }

    /// Whether both handles refer to the same loaded pipeline.
    pub fn ptr_eq(&self, other: &PipelineHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Runs the pipeline and normalizes its output into a [`ResultMap`].
    pub fn predict(&self, audio_path: &Path, quantized: bool) -> anyhow::Result<ResultMap> {
        let value = self.0.run(audio_path, quantized)?;
        Ok(into_result_map(value))
    }
}

impl Debug for PipelineHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle").finish_non_exhaustive()
    }
}

/// Wraps non-object pipeline output as `{"raw": value}`.
pub fn into_result_map(value: Value) -> ResultMap {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = ResultMap::new();
            map.insert("raw".to_string(), other);
            map
        }
    }
}
