use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

/// Default slack beyond the requested duration before ffmpeg is killed.
pub const RECORD_TIMEOUT_EXTRA: Duration = Duration::from_secs(15);

/// A recorded audio file that is deleted when dropped.
#[derive(Debug)]
pub struct AudioSample {
    path: PathBuf,
}

impl AudioSample {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AudioSample {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to delete sample {}: {}", self.path.display(), e);
            }
        }
    }
}

#[async_trait]
pub trait Recorder: Send + Sync {
    /// Capture `duration` of audio from the stream. Implementations must give
    /// up after a timeout strictly longer than `duration`.
    async fn sample(&self, stream_url: &str, duration: Duration) -> Result<AudioSample>;
}

pub struct FfmpegRecorder {
    ffmpeg_path: String,
    output_dir: PathBuf,
    timeout_extra: Duration,
}

impl FfmpegRecorder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            output_dir: std::env::temp_dir(),
            timeout_extra: RECORD_TIMEOUT_EXTRA,
        }
    }

    fn command(&self, stream_url: &str, duration: Duration, output: &Path) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-y")
            .arg("-re")
            .args(["-i", stream_url])
            .args(["-t", &duration.as_secs().to_string()])
            .args(["-acodec", "libmp3lame"])
            .args(["-ar", "44100"])
            .args(["-ac", "1"])
            .args(["-loglevel", "error"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Recorder for FfmpegRecorder {
    async fn sample(&self, stream_url: &str, duration: Duration) -> Result<AudioSample> {
        let sample = AudioSample::new(self.output_dir.join(format!("radio-sample-{}.mp3", Uuid::new_v4())));
        let timeout = duration + self.timeout_extra;

        let child = self
            .command(stream_url, duration, sample.path())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AppError::Recorder(format!(
                    "ffmpeg not found at '{}'; install it (e.g. apt install ffmpeg)",
                    self.ffmpeg_path
                )),
                _ => AppError::Recorder(format!("Failed to start ffmpeg: {}", e)),
            })?;

        // Dropping the timed-out future drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| AppError::Recorder(format!("ffmpeg timed out after {:.1}s", timeout.as_secs_f64())))??;

        if !output.status.success() {
            return Err(AppError::Recorder(format!(
                "ffmpeg failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::info!("Recorded {}s sample to {}", duration.as_secs(), sample.path().display());
        Ok(sample)
    }
}
