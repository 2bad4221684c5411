use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::sync::Semaphore;

use super::outcome::{WorkerMessage, WorkerOutcome, exit_code};
use super::spawner::{WorkerRequest, WorkerSpawner};
use crate::config::StartMode;
use crate::error::PredictionError;
use crate::pipeline::{PipelineCache, ResultMap};

/// Runs one prediction in a disposable worker process and classifies how it ended.
pub struct IsolatedExecutor {
    spawner: Arc<dyn WorkerSpawner>,
    timeout: Duration,
    grace: Duration,
    start_mode: StartMode,
    permits: Option<Arc<Semaphore>>,
}

impl IsolatedExecutor {
    pub fn new(spawner: Arc<dyn WorkerSpawner>, timeout: Duration) -> Self {
        Self {
            spawner,
            timeout,
            grace: Duration::from_secs(5),
            start_mode: StartMode::Spawn,
            permits: None,
        }
    }

    /// How long a killed worker is given to be reaped.
    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_start_mode(mut self, mode: StartMode) -> Self {
        self.start_mode = mode.resolve();
        self
    }

    /// Bounds the number of live workers. Zero means unbounded.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.permits = (max > 0).then(|| Arc::new(Semaphore::new(max)));
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Dispatches the request to a fresh worker and waits for it, at most for the timeout.
    ///
    /// Only failures to start or supervise the worker are returned as errors; everything the
    /// worker itself does is reported through the [`WorkerOutcome`].
    pub async fn execute(&self, request: &WorkerRequest) -> Result<WorkerOutcome, PredictionError> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|err| PredictionError::Spawn(err.to_string()))?,
            ),
            None => None,
        };

        let mut child = {
            let mut command = self.spawner.command(request);
            command
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .kill_on_drop(true);
            // Anything the worker starts shares its group and is killed with it.
            #[cfg(unix)]
            command.process_group(0);
            command
                .spawn()
                .map_err(|err| PredictionError::Spawn(err.to_string()))?
        };
        let pid = child.id().unwrap_or_default();

        log::info!(
            "Started isolated prediction process pid={} timeout_s={} start_method={} quantized={}",
            pid,
            self.timeout.as_secs_f64(),
            self.start_mode,
            request.quantized
        );

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PredictionError::Spawn("worker stdout not captured".to_string()))?;
        let reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(|err| PredictionError::Spawn(err.to_string()))?,
            Err(_) => {
                log::error!("Prediction process timed out; terminating pid={pid}");
                kill_worker(&mut child, pid);
                if tokio::time::timeout(self.grace, child.wait()).await.is_err() {
                    log::warn!("Prediction process pid={pid} was not reaped within the grace period");
                }
                reader.abort();
                return Ok(WorkerOutcome::Timeout);
            }
        };

        // A grandchild may still hold the pipe open, so reading is bounded too.
        let stdout = match tokio::time::timeout(self.grace, reader).await {
            Ok(Ok(Ok(buf))) => buf,
            Ok(Ok(Err(err))) => {
                log::warn!("Failed to read prediction worker output: {err}");
                Vec::new()
            }
            Ok(Err(err)) => {
                log::warn!("Prediction worker output reader failed: {err}");
                Vec::new()
            }
            Err(_) => {
                log::warn!("Prediction worker output was not closed within the grace period");
                Vec::new()
            }
        };

        let code = exit_code(&status);
        let outcome = WorkerOutcome::classify(WorkerMessage::parse(&stdout), code);
        log::debug!("Prediction process pid={pid} exited with code {code}: {outcome}");
        Ok(outcome)
    }
}

/// Kills the worker and every process in its process group.
fn kill_worker(child: &mut Child, pid: u32) {
    #[cfg(unix)]
    {
        if let Ok(group) = libc::pid_t::try_from(pid) {
            if group > 0 {
                // SAFETY: kill(2) has no memory-safety preconditions.
                if unsafe { libc::kill(-group, libc::SIGKILL) } != 0 {
                    log::warn!(
                        "Failed to kill process group of pid={pid}: {}",
                        std::io::Error::last_os_error()
                    );
                }
            }
        }
    }
    if let Err(err) = child.start_kill() {
        log::warn!("Failed to kill prediction process pid={pid}: {err}");
    }
}

/// Decides what each worker outcome means for the request.
///
/// Success returns the result, an OS kill falls back to in-process inference through the
/// shared [`PipelineCache`], and every other outcome fails the request.
pub struct Coordinator {
    executor: IsolatedExecutor,
    pipeline: Arc<PipelineCache>,
}

impl Coordinator {
    pub fn new(executor: IsolatedExecutor, pipeline: Arc<PipelineCache>) -> Self {
        Self { executor, pipeline }
    }

    pub fn pipeline(&self) -> &Arc<PipelineCache> {
        &self.pipeline
    }

    pub async fn run(&self, request: WorkerRequest) -> Result<ResultMap, PredictionError> {
        match self.executor.execute(&request).await? {
            WorkerOutcome::Success(result) => Ok(result),
            WorkerOutcome::Failure(message) => Err(PredictionError::WorkerFailed(message)),
            WorkerOutcome::Timeout => Err(PredictionError::Timeout {
                seconds: self.executor.timeout().as_secs_f64(),
            }),
            WorkerOutcome::KilledByOs { code } => {
                log::warn!(
                    "Prediction worker terminated by the OS (exit code {code}), possible memory pressure. Falling back to in-process inference."
                );
                self.run_in_process(request).await
            }
            WorkerOutcome::UnexpectedExit(code) => Err(PredictionError::UnexpectedExit(code)),
            WorkerOutcome::NoResult => Err(PredictionError::NoResult),
        }
    }

    /// Runs inference in the serving process on the blocking pool.
    pub async fn run_in_process(&self, request: WorkerRequest) -> Result<ResultMap, PredictionError> {
        log::info!("Running prediction in-process for memory-safe fallback");
        let pipeline = self.pipeline.clone();
        tokio::task::spawn_blocking(move || {
            let handle = pipeline.get_handle()?;
            handle
                .predict(&request.audio_path, request.quantized)
                .map_err(|err| PredictionError::Inference(format!("{err:#}")))
        })
        .await
        .map_err(|err| PredictionError::Inference(format!("inference task did not complete: {err}")))?
    }
}
