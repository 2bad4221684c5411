use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::staging::StagedAudio;

const STDERR_TAIL: usize = 512;

/// Bounds audio duration by transcoding it with an external `ffmpeg`-compatible tool.
///
/// Trimming never fails a request: on any error the caller keeps using the original file.
#[derive(Debug, Clone)]
pub struct AudioTrimmer {
    program: PathBuf,
    temp_dir: Option<PathBuf>,
}

impl AudioTrimmer {
    pub fn new<P: Into<PathBuf>>(program: P, temp_dir: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            temp_dir,
        }
    }

    /// Produces a copy of `input` truncated to `max_seconds`.
    ///
    /// Returns `None` when trimming is disabled (`max_seconds <= 0`) or when the transcoder
    /// fails, in which case the original file should be used unchanged.
    pub async fn trim(&self, input: &StagedAudio, max_seconds: f64) -> Option<StagedAudio> {
        if max_seconds <= 0.0 || !max_seconds.is_finite() {
            return None;
        }

        let mut trimmed = match StagedAudio::create(self.temp_dir.as_deref(), &input.suffix()) {
            Ok(trimmed) => trimmed,
            Err(err) => {
                log::warn!("Could not create temp file for trimmed audio, using original file. error={err}");
                return None;
            }
        };

        log::info!(
            "Trimming audio to max {:.2} seconds: input={} output={}",
            max_seconds,
            input.path().display(),
            trimmed.path().display()
        );

        match self.run(input.path(), trimmed.path(), max_seconds).await {
            Ok(stderr) => {
                log::info!("Audio trim completed: output={}", trimmed.path().display());
                if !stderr.is_empty() {
                    log::debug!("ffmpeg trim stderr: {stderr}");
                }
                Some(trimmed)
            }
            Err(reason) => {
                log::warn!("Audio trim failed, using original file. error={reason}");
                trimmed.release();
                None
            }
        }
    }

    async fn run(&self, input: &Path, output: &Path, max_seconds: f64) -> Result<String, String> {
        let output = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-t")
            .arg(format!("{max_seconds}"))
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| format!("could not run {}: {err}", self.program.display()))?;

        let stderr = tail(&String::from_utf8_lossy(&output.stderr));
        if output.status.success() {
            Ok(stderr)
        } else {
            Err(format!("{} ({})", output.status, stderr))
        }
    }
}

fn tail(text: &str) -> String {
    let text = text.trim();
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn non_positive_bound_disables_trimming() {
        let dir = tempfile::tempdir().unwrap();
        let input = StagedAudio::create(Some(dir.path()), ".wav").unwrap();
        let trimmer = AudioTrimmer::new("ffmpeg", Some(dir.path().to_path_buf()));

        assert!(trimmer.trim(&input, 0.0).await.is_none());
        assert!(trimmer.trim(&input, -3.0).await.is_none());
        assert_eq!(file_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn missing_tool_keeps_original_without_leaking() {
        let dir = tempfile::tempdir().unwrap();
        let input = StagedAudio::create(Some(dir.path()), ".wav").unwrap();
        let trimmer = AudioTrimmer::new(
            dir.path().join("no-such-ffmpeg"),
            Some(dir.path().to_path_buf()),
        );

        assert!(trimmer.trim(&input, 45.0).await.is_none());
        assert!(input.path().exists());
        assert_eq!(file_count(dir.path()), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_tool_keeps_original_without_leaking() {
        let tools = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let ffmpeg = write_script(tools.path(), "ffmpeg", "echo 'corrupt input' >&2\nexit 1");
        let input = StagedAudio::create(Some(staging.path()), ".wav").unwrap();
        let trimmer = AudioTrimmer::new(ffmpeg, Some(staging.path().to_path_buf()));

        assert!(trimmer.trim(&input, 45.0).await.is_none());
        assert_eq!(file_count(staging.path()), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_trim_produces_second_file() {
        let tools = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        // Arguments: -y -i <input> -t <seconds> <output>
        let ffmpeg = write_script(tools.path(), "ffmpeg", "[ \"$5\" = \"12.5\" ] || exit 2\ncp \"$3\" \"$6\"");
        let input = StagedAudio::create(Some(staging.path()), ".ogg").unwrap();
        std::fs::write(input.path(), b"OggS").unwrap();
        let trimmer = AudioTrimmer::new(ffmpeg, Some(staging.path().to_path_buf()));

        let trimmed = trimmer.trim(&input, 12.5).await.unwrap();

        assert_ne!(trimmed.path(), input.path());
        assert_eq!(trimmed.suffix(), ".ogg");
        assert_eq!(std::fs::read(trimmed.path()).unwrap(), b"OggS");

        drop(trimmed);
        assert_eq!(file_count(staging.path()), 1);
    }

    #[test]
    fn tail_keeps_end_of_long_output() {
        let long = "x".repeat(2000) + "END";
        let tailed = tail(&long);

        assert!(tailed.ends_with("END"));
        assert!(tailed.len() <= STDERR_TAIL + 1);
    }
}
