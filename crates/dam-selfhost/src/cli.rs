use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use dam_selfhost_runtime::{CommandPipelineConfig, ServiceConfig, StartMode};

use crate::{commands, logging};

#[derive(Parser, Debug)]
#[command(
    name = "dam-selfhost",
    version,
    about = "Self-hosted DAM depression inference service",
    args_conflicts_with_subcommands = true
)]
pub struct CliArgs {
    /// Log level, overridden by RUST_LOG.
    #[arg(long, env = "DAM_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Serving options, used when no subcommand is given.
    #[command(flatten)]
    pub serve: ServeArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP prediction server.
    Serve(ServeArgs),
    /// Run one prediction and print the result as JSON. Launched by the server.
    #[command(hide = true)]
    Worker(WorkerArgs),
}

/// Adapter configuration for the external pipeline program, shared by server and worker.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct PipelineArgs {
    #[arg(long, env = "DAM_PIPELINE_PROGRAM", default_value = "dam-pipeline")]
    pub pipeline_program: PathBuf,

    /// Extra argument for the pipeline program, repeatable.
    #[arg(
        long = "pipeline-arg",
        env = "DAM_PIPELINE_ARGS",
        value_delimiter = ' ',
        allow_hyphen_values = true
    )]
    pub pipeline_args: Vec<String>,

    #[arg(long, env = "DAM_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,
}

impl PipelineArgs {
    pub fn loader_config(&self) -> CommandPipelineConfig {
        let config = CommandPipelineConfig::new(&self.pipeline_program)
            .with_args(self.pipeline_args.iter().filter(|arg| !arg.is_empty()).cloned());
        match &self.model_dir {
            Some(dir) => config.with_model_dir(dir),
            None => config,
        }
    }

    /// The same configuration as command line arguments for a worker process.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--pipeline-program".into(),
            self.pipeline_program.clone().into(),
        ];
        args.extend(
            self.pipeline_args
                .iter()
                .filter(|arg| !arg.is_empty())
                .map(|arg| OsString::from(format!("--pipeline-arg={arg}"))),
        );
        if let Some(dir) = &self.model_dir {
            args.push("--model-dir".into());
            args.push(dir.clone().into());
        }
        args
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "DAM_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "DAM_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Wall time granted to one isolated prediction.
    #[arg(
        long,
        env = "DAM_PREDICT_TIMEOUT_SECONDS",
        default_value_t = 300.0,
        allow_negative_numbers = true
    )]
    pub predict_timeout_seconds: f64,

    /// How long a killed worker is given to exit.
    #[arg(
        long,
        env = "DAM_TERMINATION_GRACE_SECONDS",
        default_value_t = 5.0,
        allow_negative_numbers = true
    )]
    pub termination_grace_seconds: f64,

    /// Audio is trimmed to this many seconds; zero or less disables trimming.
    #[arg(
        long,
        env = "DAM_MAX_AUDIO_SECONDS",
        default_value_t = 45.0,
        allow_negative_numbers = true
    )]
    pub max_audio_seconds: f64,

    /// Return a fixed result without running the pipeline.
    #[arg(
        long,
        env = "DAM_MOCK_MODE",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub mock_mode: bool,

    /// Load the pipeline before accepting requests.
    #[arg(
        long,
        env = "DAM_PRELOAD_ON_STARTUP",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "true",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub preload_on_startup: bool,

    /// `spawn` or `fork`; unknown values fall back to `spawn`.
    #[arg(long, env = "DAM_PROCESS_START_METHOD", default_value = "spawn")]
    pub process_start_method: String,

    #[arg(
        long,
        env = "DAM_DOWNLOAD_TIMEOUT_SECONDS",
        default_value_t = 120.0,
        allow_negative_numbers = true
    )]
    pub download_timeout_seconds: f64,

    /// Maximum number of concurrent worker processes, 0 for no limit.
    #[arg(long, env = "DAM_MAX_CONCURRENT_WORKERS", default_value_t = 0)]
    pub max_concurrent_workers: usize,

    #[arg(long, env = "DAM_FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: PathBuf,

    /// Directory for staged audio files, the system temp directory by default.
    #[arg(long, env = "DAM_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl ServeArgs {
    pub fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        let mut config = ServiceConfig::default()
            .with_prediction_timeout(positive_seconds(
                "predict timeout",
                self.predict_timeout_seconds,
            )?)
            .with_termination_grace(
                Duration::try_from_secs_f64(self.termination_grace_seconds)
                    .context("invalid termination grace")?,
            )
            .with_max_audio_seconds(self.max_audio_seconds)
            .with_mock_mode(self.mock_mode)
            .with_preload_on_startup(self.preload_on_startup)
            .with_start_mode(StartMode::parse_or_default(&self.process_start_method))
            .with_download_timeout(positive_seconds(
                "download timeout",
                self.download_timeout_seconds,
            )?)
            .with_max_concurrent_workers(self.max_concurrent_workers)
            .with_ffmpeg_path(&self.ffmpeg_path);
        if let Some(dir) = &self.temp_dir {
            config = config.with_temp_dir(dir);
        }
        Ok(config)
    }

    /// Leading arguments for the worker processes this server launches.
    pub fn worker_args(&self, log_level: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["worker".into(), "--log-level".into(), log_level.into()];
        args.extend(self.pipeline.to_args());
        args
    }
}

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Audio file to run the prediction on.
    #[arg(long)]
    pub audio: PathBuf,

    #[arg(
        long,
        action = ArgAction::Set,
        default_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub quantized: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

fn positive_seconds(name: &str, seconds: f64) -> anyhow::Result<Duration> {
    if seconds.is_nan() || seconds <= 0.0 {
        anyhow::bail!("{name} must be a positive number of seconds, got {seconds}");
    }
    Duration::try_from_secs_f64(seconds).with_context(|| format!("invalid {name}"))
}

pub fn cli_main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    logging::init(&args.log_level);

    match args.command.unwrap_or(Commands::Serve(args.serve)) {
        Commands::Serve(serve_args) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start the async runtime")?;
            runtime.block_on(commands::serve::handle_command(serve_args, &args.log_level))
        }
        Commands::Worker(worker_args) => commands::worker::handle_command(worker_args),
    }
}
