use std::io::{self, Write};
use std::sync::Arc;

use super::outcome::WorkerMessage;
use super::spawner::WorkerRequest;
use crate::error::PipelineKilled;
use crate::pipeline::{PipelineCache, PipelineLoader};

/// How a worker process finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerExit {
    /// Print the message and exit normally.
    Report(WorkerMessage),
    /// The OS killed the pipeline. The worker prints nothing and exits with
    /// [`relayed_exit_code`](super::relayed_exit_code) of `code`, so the parent sees an OS kill.
    Killed { code: i32 },
}

/// Body of a worker process: loads its own pipeline, runs one prediction and reports back.
///
/// Failures are converted into a failure message so that the parent can tell a pipeline
/// error apart from the process dying.
pub fn run_worker(loader: Arc<dyn PipelineLoader>, request: &WorkerRequest) -> WorkerExit {
    log::info!(
        "Prediction worker started pid={} quantized={}",
        std::process::id(),
        request.quantized
    );

    let cache = PipelineCache::new(loader);
    let handle = match cache.get_handle() {
        Ok(handle) => handle,
        Err(err) => return WorkerExit::Report(WorkerMessage::failure(err.to_string())),
    };

    match handle.predict(&request.audio_path, request.quantized) {
        Ok(result) => WorkerExit::Report(WorkerMessage::success(result)),
        Err(err) => {
            if let Some(killed) = err.downcast_ref::<PipelineKilled>() {
                log::warn!("Prediction worker relaying pipeline kill: {killed}");
                return WorkerExit::Killed { code: killed.code };
            }
            log::error!("Prediction worker failed: {err:#}");
            WorkerExit::Report(WorkerMessage::failure(format!("{err:#}")))
        }
    }
}

/// Writes the message as a single JSON line.
pub fn write_message(out: &mut impl Write, message: &WorkerMessage) -> io::Result<()> {
    serde_json::to_writer(&mut *out, message)?;
    out.write_all(b"\n")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineLoadError;
    use crate::pipeline::{Pipeline, PipelineHandle};
    use serde_json::{Value, json};
    use std::path::{Path, PathBuf};

    struct Echo;

    impl Pipeline for Echo {
        fn run(&self, audio_path: &Path, quantized: bool) -> anyhow::Result<Value> {
            Ok(json!({"audio": audio_path, "quantized": quantized}))
        }
    }

    struct Broken;

    impl Pipeline for Broken {
        fn run(&self, _audio_path: &Path, _quantized: bool) -> anyhow::Result<Value> {
            anyhow::bail!("unsupported codec")
        }
    }

    struct OutOfMemory;

    impl Pipeline for OutOfMemory {
        fn run(&self, _audio_path: &Path, _quantized: bool) -> anyhow::Result<Value> {
            Err(PipelineKilled { code: -9 }.into())
        }
    }

    fn request() -> WorkerRequest {
        WorkerRequest::new(PathBuf::from("/tmp/clip.wav"), false)
    }

    fn report(exit: WorkerExit) -> WorkerMessage {
        match exit {
            WorkerExit::Report(message) => message,
            WorkerExit::Killed { code } => panic!("expected a message, got a kill with code {code}"),
        }
    }

    #[test]
    fn reports_pipeline_result() {
        let loader = Arc::new(|| -> Result<PipelineHandle, PipelineLoadError> {
            Ok(PipelineHandle::new(Echo))
        });

        let message = report(run_worker(loader, &request()));

        assert!(message.ok);
        assert_eq!(message.result, Some(json!({"audio": "/tmp/clip.wav", "quantized": false})));
    }

    #[test]
    fn reports_inference_failure() {
        let loader = Arc::new(|| -> Result<PipelineHandle, PipelineLoadError> {
            Ok(PipelineHandle::new(Broken))
        });

        let message = report(run_worker(loader, &request()));

        assert_eq!(message, WorkerMessage::failure("unsupported codec"));
    }

    #[test]
    fn relays_pipeline_kill() {
        let loader = Arc::new(|| -> Result<PipelineHandle, PipelineLoadError> {
            Ok(PipelineHandle::new(OutOfMemory))
        });

        assert_eq!(run_worker(loader, &request()), WorkerExit::Killed { code: -9 });
    }

    #[test]
    fn reports_load_failure() {
        let loader = Arc::new(|| -> Result<PipelineHandle, PipelineLoadError> {
            Err(PipelineLoadError::new("missing model weights"))
        });

        let message = report(run_worker(loader, &request()));

        assert!(!message.ok);
        assert_eq!(
            message.error.as_deref(),
            Some("DAM pipeline could not be loaded: missing model weights")
        );
    }

    #[test]
    fn message_is_one_parsable_line() {
        let mut out = Vec::new();
        write_message(&mut out, &WorkerMessage::failure("boom")).unwrap();

        assert!(out.ends_with(b"\n"));
        assert_eq!(out.iter().filter(|byte| **byte == b'\n').count(), 1);
        assert_eq!(WorkerMessage::parse(&out), Some(WorkerMessage::failure("boom")));
    }
}
