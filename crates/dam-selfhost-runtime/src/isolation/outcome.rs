use std::process::ExitStatus;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::ResultMap;

/// The single message a worker writes to its stdout before exiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerMessage {
    pub fn success(result: ResultMap) -> Self {
        Self {
            ok: true,
            result: Some(Value::Object(result)),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Finds the worker message in captured stdout. The last line that parses wins, so stray
    /// output printed by the pipeline before the message is ignored.
    pub fn parse(stdout: &[u8]) -> Option<Self> {
        String::from_utf8_lossy(stdout)
            .lines()
            .rev()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .find_map(|line| serde_json::from_str(line).ok())
    }
}

/// Outcome of one isolated prediction attempt.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum WorkerOutcome {
    #[display("success")]
    Success(ResultMap),
    #[display("failure: {_0}")]
    Failure(String),
    #[display("timeout")]
    Timeout,
    #[display("killed by the OS (exit code {code})")]
    KilledByOs { code: i32 },
    #[display("unexpected exit with code {_0}")]
    UnexpectedExit(i32),
    #[display("clean exit without a result")]
    NoResult,
}

impl WorkerOutcome {
    /// Classifies a finished worker from its message (if any) and exit code.
    ///
    /// A message always takes precedence over the exit code.
    pub fn classify(message: Option<WorkerMessage>, exit_code: i32) -> Self {
        match message {
            Some(WorkerMessage { ok: true, result, .. }) => match result {
                Some(Value::Object(map)) => WorkerOutcome::Success(map),
                _ => WorkerOutcome::Failure(
                    "DAM prediction worker returned invalid result payload".to_string(),
                ),
            },
            Some(WorkerMessage { ok: false, error, .. }) => WorkerOutcome::Failure(
                error.unwrap_or_else(|| "DAM prediction worker failed".to_string()),
            ),
            None if exit_code == 0 => WorkerOutcome::NoResult,
            None if is_os_kill(exit_code) => WorkerOutcome::KilledByOs { code: exit_code },
            None => WorkerOutcome::UnexpectedExit(exit_code),
        }
    }
}

/// Exit codes that mean the OS terminated the worker for resource reasons.
///
/// Unix: SIGKILL, seen directly (`-9`) or through a shell or container runtime (`128 + 9`).
#[cfg(unix)]
const OS_KILL_EXIT_CODES: &[i32] = &[-9, 137];

/// Windows: STATUS_NO_MEMORY and STATUS_COMMITMENT_LIMIT.
#[cfg(windows)]
const OS_KILL_EXIT_CODES: &[i32] = &[0xC000_0017_u32 as i32, 0xC000_012D_u32 as i32];

#[cfg(not(any(unix, windows)))]
const OS_KILL_EXIT_CODES: &[i32] = &[];

pub fn is_os_kill(exit_code: i32) -> bool {
    OS_KILL_EXIT_CODES.contains(&exit_code)
}

/// The exit status a process should use to report `code`, an OS-kill code of one of its own
/// children, so that its parent classifies it the same way.
///
/// A process cannot exit with a negative status on Unix, so `-9` is reported as `137`.
pub fn relayed_exit_code(code: i32) -> i32 {
    if cfg!(unix) && code < 0 { 128 - code } else { code }
}

/// The exit code of a process, with signal terminations reported as the negated signal.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
