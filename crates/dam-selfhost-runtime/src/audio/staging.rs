use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

/// A temporary audio file owned by exactly one request.
///
/// The file is deleted when the value is released or dropped, whichever comes first.
/// Releasing twice, or releasing a file that something else already removed, is a no-op.
/// Deletion failures are logged and never returned.
#[derive(Debug)]
pub struct StagedAudio {
    path: PathBuf,
    guard: Option<TempPath>,
}

impl StagedAudio {
    /// Creates a new, empty staged file with the given suffix (for example `.wav`).
    pub fn create(dir: Option<&Path>, suffix: &str) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("dam-audio-").suffix(suffix);
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let guard = file.into_temp_path();
        Ok(Self {
            path: guard.to_path_buf(),
            guard: Some(guard),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file suffix including the leading dot, `.wav` when the file has none.
    pub fn suffix(&self) -> String {
        self.path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_else(|| ".wav".to_string())
    }

    pub fn is_released(&self) -> bool {
        self.guard.is_none()
    }

    pub fn release(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        match guard.close() {
            Ok(()) => log::debug!("Removed temp audio file: {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => log::warn!(
                "Failed to clean temp audio file: {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

impl Drop for StagedAudio {
    fn drop(&mut self) {
        self.release();
    }
}
