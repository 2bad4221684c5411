use std::sync::Arc;

use anyhow::Context as _;
use dam_selfhost_runtime::isolation::{WorkerExit, relayed_exit_code, run_worker, write_message};
use dam_selfhost_runtime::WorkerRequest;

use crate::cli::WorkerArgs;

/// Runs one prediction and writes the outcome to stdout.
///
/// Pipeline failures are reported in the message and still exit 0; only a failure to
/// report at all makes the process exit non-zero. When the OS kills the pipeline, the
/// worker exits with the same kill code instead of reporting.
pub fn handle_command(args: WorkerArgs) -> anyhow::Result<()> {
    let loader = Arc::new(args.pipeline.loader_config());
    let message = match run_worker(loader, &WorkerRequest::new(args.audio, args.quantized)) {
        WorkerExit::Report(message) => message,
        WorkerExit::Killed { code } => std::process::exit(relayed_exit_code(code)),
    };

    let stdout = std::io::stdout();
    write_message(&mut stdout.lock(), &message).context("failed to write the worker result")?;
    Ok(())
}
