use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

use super::{PipelineHandle, PipelineLoader};
use crate::error::PipelineLoadError;

/// Lazily constructs and caches the process-wide pipeline.
///
/// Construction uses double-checked locking: callers first look for a loaded handle without
/// locking, then serialize on the construction lock and look again before loading.
/// Callers that waited on an attempt receive that attempt's outcome, success or failure.
/// A failed attempt is not cached, so a later call will try again.
pub struct PipelineCache {
    loader: Arc<dyn PipelineLoader>,
    handle: OnceCell<PipelineHandle>,
    construction: Mutex<Option<PipelineLoadError>>,
    finished_attempts: AtomicU64,
}

impl PipelineCache {
    pub fn new(loader: Arc<dyn PipelineLoader>) -> Self {
        Self {
            loader,
            handle: OnceCell::new(),
            construction: Mutex::new(None),
            finished_attempts: AtomicU64::new(0),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Returns the shared pipeline, loading it on first use. Blocks while loading.
    pub fn get_handle(&self) -> Result<PipelineHandle, PipelineLoadError> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        let observed = self.finished_attempts.load(Ordering::Acquire);
        let mut last_error = self
            .construction
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }
        if self.finished_attempts.load(Ordering::Acquire) != observed {
            if let Some(err) = last_error.as_ref() {
                return Err(err.clone());
            }
        }

        log::info!("Loading DAM pipeline...");
        let result = self.loader.load();
        let outcome = match result {
            Ok(handle) => {
                let handle = self.handle.get_or_init(|| handle).clone();
                *last_error = None;
                log::info!("DAM pipeline loaded");
                Ok(handle)
            }
            Err(err) => {
                log::error!("{err}");
                *last_error = Some(err.clone());
                Err(err)
            }
        };
        self.finished_attempts.fetch_add(1, Ordering::Release);
        outcome
    }
}
