use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context as _;
use serde_json::Value;

use super::{Pipeline, PipelineHandle, PipelineLoader};
use crate::error::{PipelineKilled, PipelineLoadError};
use crate::isolation::{exit_code, is_os_kill};

/// Configuration of the external program that hosts the DAM model.
///
/// The program is invoked once per prediction as
/// `<program> <args..> --input <audio> [--quantize] [--model-dir <dir>]` and must print the
/// result as a single JSON document on stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPipelineConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub model_dir: Option<PathBuf>,
}

impl Default for CommandPipelineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("dam-pipeline"),
            args: Vec::new(),
            model_dir: None,
        }
    }
}

impl CommandPipelineConfig {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.model_dir = Some(dir.into());
        self
    }

    fn validate(&self) -> Result<(), PipelineLoadError> {
        // Paths are logged, never returned: load errors reach API clients.
        if self.program.as_os_str().is_empty() {
            return Err(PipelineLoadError::new("no pipeline program configured"));
        }
        // Bare program names are resolved through PATH when the pipeline runs.
        if self.program.components().count() > 1 && !self.program.is_file() {
            log::error!("Pipeline program {} does not exist", self.program.display());
            return Err(PipelineLoadError::new("pipeline program is missing"));
        }
        if let Some(dir) = &self.model_dir {
            if !dir.is_dir() {
                log::error!("Model directory {} does not exist", dir.display());
                return Err(PipelineLoadError::new("model directory is missing"));
            }
        }
        Ok(())
    }
}

impl PipelineLoader for CommandPipelineConfig {
    fn load(&self) -> Result<PipelineHandle, PipelineLoadError> {
        self.validate()?;
        Ok(PipelineHandle::new(CommandPipeline {
            config: self.clone(),
        }))
    }
}

/// Pipeline backed by an external program.
#[derive(Debug)]
pub struct CommandPipeline {
    config: CommandPipelineConfig,
}

impl CommandPipeline {
    fn command(&self, audio_path: &Path, quantized: bool) -> Command {
        let mut command = Command::new(&self.config.program);
        command.args(&self.config.args).arg("--input").arg(audio_path);
        if quantized {
            command.arg("--quantize");
        }
        if let Some(dir) = &self.config.model_dir {
            command.arg("--model-dir").arg(dir);
        }
        command.stdin(Stdio::null());
        command
    }
}

impl Pipeline for CommandPipeline {
    fn run(&self, audio_path: &Path, quantized: bool) -> anyhow::Result<Value> {
        let output = self.command(audio_path, quantized).output().map_err(|err| {
            log::error!("Failed to run {}: {err}", self.config.program.display());
            anyhow::anyhow!("failed to start the pipeline program: {}", err.kind())
        })?;

        let code = exit_code(&output.status);
        if is_os_kill(code) {
            return Err(PipelineKilled { code }.into());
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "pipeline exited with {}: {}",
                output.status,
                stderr.trim().lines().last().unwrap_or_default()
            );
        }

        serde_json::from_slice(&output.stdout).context("pipeline output is not valid JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_dir_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = CommandPipelineConfig::new("dam-pipeline").with_model_dir(dir.path().join("weights"));

        let err = config.load().unwrap_err();

        assert_eq!(err, PipelineLoadError::new("model directory is missing"));
        assert!(!err.to_string().contains(&*dir.path().to_string_lossy()));
    }

    #[test]
    fn missing_explicit_program_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = CommandPipelineConfig::new(dir.path().join("bin").join("dam-pipeline"));

        let err = config.load().unwrap_err();

        assert!(!err.to_string().contains(&*dir.path().to_string_lossy()));
    }

    #[test]
    fn bare_program_name_loads() {
        let dir = tempfile::tempdir().unwrap();
        let config = CommandPipelineConfig::new("dam-pipeline").with_model_dir(dir.path());

        assert!(config.load().is_ok());
    }

    #[test]
    fn builds_invocation_arguments() {
        let pipeline = CommandPipeline {
            config: CommandPipelineConfig::new("python3")
                .with_args(["-m", "dam.run"])
                .with_model_dir("/models/dam"),
        };

        let command = pipeline.command(Path::new("clip.wav"), true);
        let args: Vec<_> = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        assert_eq!(command.get_program(), "python3");
        assert_eq!(
            args,
            ["-m", "dam.run", "--input", "clip.wav", "--quantize", "--model-dir", "/models/dam"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn runs_program_and_parses_stdout() {
        let pipeline = CommandPipelineConfig::new("sh")
            .with_args(["-c", "echo '{\"depression_score\": 0.1}'", "dam"])
            .load()
            .unwrap();

        let result = pipeline.predict(Path::new("clip.wav"), false).unwrap();

        assert_eq!(result["depression_score"], 0.1);
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_error() {
        let pipeline = CommandPipelineConfig::new("sh")
            .with_args(["-c", "echo 'model crashed' >&2; exit 3", "dam"])
            .load()
            .unwrap();

        let err = pipeline.predict(Path::new("clip.wav"), false).unwrap_err();

        assert!(err.to_string().contains("model crashed"));
        assert!(err.downcast_ref::<PipelineKilled>().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn os_kill_of_the_program_is_typed() {
        let pipeline = CommandPipelineConfig::new("sh")
            .with_args(["-c", "kill -9 $$", "dam"])
            .load()
            .unwrap();

        let err = pipeline.predict(Path::new("clip.wav"), false).unwrap_err();

        assert_eq!(
            err.downcast_ref::<PipelineKilled>(),
            Some(&PipelineKilled { code: -9 })
        );
    }

    #[test]
    fn unstartable_program_error_has_no_path() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = PipelineHandle::new(CommandPipeline {
            config: CommandPipelineConfig::new(dir.path().join("dam-pipeline")),
        });

        let err = pipeline.predict(Path::new("clip.wav"), false).unwrap_err();

        assert!(err.to_string().starts_with("failed to start the pipeline program"));
        assert!(!err.to_string().contains(&*dir.path().to_string_lossy()));
    }
}
