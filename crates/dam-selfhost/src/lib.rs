//! DAM self-hosted prediction server
//!
//! One binary, two roles: `serve` runs the HTTP API, `worker` is the disposable process the
//! server launches for every prediction.

pub mod api;
pub mod cli;
pub mod error;
pub mod logging;
pub mod state;

mod commands;
