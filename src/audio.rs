use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// Audio extraction and probing via the external ffmpeg/ffprobe tools
#[derive(Debug, Clone, Default)]
pub struct AudioExtractor;

impl AudioExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the compressed audio track from a video.
    ///
    /// Fixed mp3 output at quality 4; a non-zero ffmpeg exit is fatal for
    /// the stage and any partial output file is removed before returning.
    pub async fn extract(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("🎵 Extracting audio: {}", video_path.display());

        let output = Command::new("ffmpeg")
            .args([
                "-i",
                &*video_path.to_string_lossy(),
                "-vn",
                "-acodec",
                "libmp3lame",
                "-q:a",
                "4",
                "-y",
                &*audio_path.to_string_lossy(),
            ])
            .output()
            .await?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(audio_path).await;
            return Err(PipelineError::Extraction(format!(
                "ffmpeg exited with {} for {}: {}",
                output.status,
                video_path.display(),
                stderr_tail(&output.stderr),
            )));
        }

        debug!("✅ Audio extracted: {}", audio_path.display());
        Ok(())
    }

    /// Total duration of an audio file in seconds, via ffprobe
    pub async fn probe_duration(&self, audio_path: &Path) -> Result<f64> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                &*audio_path.to_string_lossy(),
            ])
            .output()
            .await?;

        if !output.status.success() {
            return Err(PipelineError::Extraction(format!(
                "ffprobe failed for {}",
                audio_path.display()
            )));
        }

        let probe: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| PipelineError::Extraction(format!("unreadable ffprobe output: {}", e)))?;

        probe["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                PipelineError::Extraction(format!(
                    "no duration in ffprobe output for {}",
                    audio_path.display()
                ))
            })
    }

    /// Cut a time slice out of an audio file without re-encoding
    pub async fn cut_chunk(
        &self,
        audio_path: &Path,
        start_secs: f64,
        length_secs: f64,
        chunk_path: &Path,
    ) -> Result<()> {
        let output = Command::new("ffmpeg")
            .args([
                "-i",
                &*audio_path.to_string_lossy(),
                "-ss",
                &*start_secs.to_string(),
                "-t",
                &*length_secs.to_string(),
                "-c",
                "copy",
                "-y",
                &*chunk_path.to_string_lossy(),
            ])
            .output()
            .await?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(chunk_path).await;
            return Err(PipelineError::Extraction(format!(
                "ffmpeg chunk cut at {:.0}s failed: {}",
                start_secs,
                stderr_tail(&output.stderr),
            )));
        }

        Ok(())
    }
}

/// Last line of a tool's stderr, for error messages
fn stderr_tail(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .next_back()
        .unwrap_or("no diagnostic output")
        .to_string()
}
