use std::ffi::OsString;
use std::path::PathBuf;

use derive_new::new;
use tokio::process::Command;

/// What a worker needs to run one prediction. The parent's pipeline is never shared.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct WorkerRequest {
    pub audio_path: PathBuf,
    pub quantized: bool,
}

/// Extension point for how a worker process is launched.
///
/// The coordinator owns stdio, timeouts and teardown; a spawner only decides what to run.
pub trait WorkerSpawner: Send + Sync {
    fn command(&self, request: &WorkerRequest) -> Command;
}

/// Launches workers by re-invoking an executable, typically the server binary itself.
///
/// The request is appended as `--audio <path> --quantized <bool>`.
#[derive(Debug, Clone)]
pub struct ExecutableSpawner {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ExecutableSpawner {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A spawner that re-runs the current executable with the given leading arguments.
    pub fn current_exe<I, S>(args: I) -> std::io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Ok(Self::new(std::env::current_exe()?, args))
    }
}

impl WorkerSpawner for ExecutableSpawner {
    fn command(&self, request: &WorkerRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--audio")
            .arg(&request.audio_path)
            .arg("--quantized")
            .arg(request.quantized.to_string());
        command
    }
}
