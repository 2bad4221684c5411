//! Per-request process isolation.
//!
//! The serving process never runs the pipeline on the request path. Instead a
//! [`WorkerSpawner`] launches a fresh worker, the [`IsolatedExecutor`] supervises it and
//! the [`Coordinator`] turns the resulting [`WorkerOutcome`] into a response.

mod coordinator;
mod outcome;
mod spawner;
mod worker;

pub use coordinator::{Coordinator, IsolatedExecutor};
pub use outcome::{WorkerMessage, WorkerOutcome, exit_code, is_os_kill, relayed_exit_code};
pub use spawner::{ExecutableSpawner, WorkerRequest, WorkerSpawner};
pub use worker::{WorkerExit, run_worker, write_message};
