use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumString};

/// How a worker process is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StartMode {
    /// Launch a fresh copy of the executable for every prediction.
    #[default]
    Spawn,
    /// Copy-on-fork of the serving process.
    Fork,
}

impl StartMode {
    /// Parses a configured start mode, falling back to [`StartMode::Spawn`] for unknown values.
    pub fn parse_or_default(raw: &str) -> Self {
        match StartMode::from_str(raw.trim()) {
            Ok(mode) => mode,
            Err(_) => {
                log::warn!(
                    "Unknown process start method '{}', using '{}'",
                    raw.trim(),
                    StartMode::Spawn
                );
                StartMode::Spawn
            }
        }
    }

    /// Returns the mode that will actually be used on this host.
    ///
    /// Forking a process that runs a multi-threaded async runtime is unsound, so the serving
    /// process never forks: `fork` resolves to `spawn` on every platform.
    pub fn resolve(self) -> Self {
        match self {
            StartMode::Spawn => StartMode::Spawn,
            StartMode::Fork => {
                if cfg!(unix) {
                    log::warn!(
                        "Process start method 'fork' is not supported by a multi-threaded server, using 'spawn'"
                    );
                } else {
                    log::warn!("Process start method 'fork' is not available on this platform, using 'spawn'");
                }
                StartMode::Spawn
            }
        }
    }
}

/// Configuration for the prediction service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Wall time granted to one isolated prediction
    pub prediction_timeout: Duration,
    /// How long to wait for a killed worker to be reaped
    pub termination_grace: Duration,
    /// Upper bound on audio duration in seconds; non-positive disables trimming
    pub max_audio_seconds: f64,
    /// Bypass the pipeline, the transcoder and the network entirely
    pub mock_mode: bool,
    /// Load the pipeline when the server starts instead of on first use
    pub preload_on_startup: bool,
    /// How worker processes are started
    pub start_mode: StartMode,
    /// Timeout for remote audio downloads
    pub download_timeout: Duration,
    /// Maximum number of concurrent worker processes, 0 for unbounded
    pub max_concurrent_workers: usize,
    /// Transcoder used to trim audio
    pub ffmpeg_path: PathBuf,
    /// Directory for staged audio, the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            prediction_timeout: Duration::from_secs(300),
            termination_grace: Duration::from_secs(5),
            max_audio_seconds: 45.0,
            mock_mode: false,
            preload_on_startup: true,
            start_mode: StartMode::default(),
            download_timeout: Duration::from_secs(120),
            max_concurrent_workers: 0,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            temp_dir: None,
        }
    }
}

impl ServiceConfig {
    pub fn with_prediction_timeout(mut self, timeout: Duration) -> Self {
        self.prediction_timeout = timeout;
        self
    }

    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace = grace;
        self
    }

    pub fn with_max_audio_seconds(mut self, seconds: f64) -> Self {
        self.max_audio_seconds = seconds;
        self
    }

    pub fn with_mock_mode(mut self, mock_mode: bool) -> Self {
        self.mock_mode = mock_mode;
        self
    }

    pub fn with_preload_on_startup(mut self, preload: bool) -> Self {
        self.preload_on_startup = preload;
        self
    }

    pub fn with_start_mode(mut self, mode: StartMode) -> Self {
        self.start_mode = mode;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_workers(mut self, max: usize) -> Self {
        self.max_concurrent_workers = max;
        self
    }

    pub fn with_ffmpeg_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("spawn", StartMode::Spawn)]
    #[case("fork", StartMode::Fork)]
    #[case(" FORK ", StartMode::Fork)]
    #[case("forkserver", StartMode::Spawn)]
    #[case("", StartMode::Spawn)]
    fn parses_start_mode(#[case] raw: &str, #[case] expected: StartMode) {
        assert_eq!(StartMode::parse_or_default(raw), expected);
    }

    #[test]
    fn fork_resolves_to_spawn() {
        assert_eq!(StartMode::Fork.resolve(), StartMode::Spawn);
        assert_eq!(StartMode::Spawn.resolve(), StartMode::Spawn);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ServiceConfig::default();

        assert_eq!(config.prediction_timeout, Duration::from_secs(300));
        assert_eq!(config.termination_grace, Duration::from_secs(5));
        assert_eq!(config.max_audio_seconds, 45.0);
        assert_eq!(config.download_timeout, Duration::from_secs(120));
        assert!(!config.mock_mode);
        assert!(config.preload_on_startup);
        assert_eq!(config.start_mode.to_string(), "spawn");
    }
}
