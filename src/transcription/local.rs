use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::TranscriptionConfig;
use crate::error::{PipelineError, Result};
use crate::identity::VideoId;
use crate::status::{PipelineStatus, Stage, StatusTracker};

use super::{Segment, Transcriber, Transcript};

/// Local whisper CLI backend.
///
/// Runs the model in one pass over the full audio file; local inference has
/// no upload size limit, so the chunking strategy never applies here.
/// Progress is two coarse checkpoints rather than a continuous feed.
pub struct LocalWhisperTranscriber {
    model_size: String,
    language: String,
}

impl LocalWhisperTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            model_size: config.model_size.clone(),
            language: config.language.clone(),
        }
    }

    /// Whether the whisper CLI can be invoked at all
    pub async fn available() -> bool {
        Command::new("whisper")
            .arg("--help")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn run_whisper(&self, audio_path: &Path, output_dir: &Path) -> Result<Transcript> {
        let output = Command::new("whisper")
            .arg(&*audio_path.to_string_lossy())
            .args(["--model", self.model_size.as_str()])
            .args(["--language", self.language.as_str()])
            .args(["--output_dir", &*output_dir.to_string_lossy()])
            .args(["--output_format", "json"])
            .args(["--verbose", "False"])
            .args(["--fp16", "False"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(PipelineError::Transcription(format!(
                "whisper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
                    .lines()
                    .next_back()
                    .unwrap_or("no diagnostic output"),
            )));
        }

        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let json_path = output_dir.join(format!("{}.json", stem));

        let content = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            PipelineError::Transcription(format!(
                "whisper JSON output missing at {}: {}",
                json_path.display(),
                e
            ))
        })?;

        let parsed: WhisperJson = serde_json::from_str(&content)
            .map_err(|e| PipelineError::Transcription(format!("unreadable whisper JSON: {}", e)))?;

        Ok(parsed.into())
    }
}

#[async_trait]
impl Transcriber for LocalWhisperTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        id: &VideoId,
        status: &StatusTracker,
    ) -> Result<Transcript> {
        info!("🎙️ Local whisper ({}) on {}", self.model_size, audio_path.display());
        status.set(id, PipelineStatus::new(Stage::Processing, 50)).await;

        let output_dir = tempfile::tempdir()?;
        let transcript = self.run_whisper(audio_path, output_dir.path()).await?;

        debug!(
            "✅ Local transcription: {} chars, {} segments",
            transcript.full_text.len(),
            transcript.segments.len()
        );
        status.set(id, PipelineStatus::new(Stage::Processing, 90)).await;

        Ok(transcript)
    }

    fn name(&self) -> &'static str {
        "local-whisper"
    }
}

/// JSON output file shape of the whisper CLI
#[derive(Debug, Deserialize)]
struct WhisperJson {
    text: String,
    #[serde(default)]
    segments: Vec<WhisperJsonSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperJsonSegment {
    start: f64,
    end: f64,
    text: String,
}

impl From<WhisperJson> for Transcript {
    fn from(json: WhisperJson) -> Self {
        Transcript {
            full_text: json.text.trim().to_string(),
            segments: json
                .segments
                .into_iter()
                .map(|s| Segment {
                    start: s.start,
                    end: s.end,
                    text: s.text.trim().to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whisper_json_parses_and_trims() {
        let raw = r#"{
            "text": " full lecture text ",
            "segments": [
                {"id": 0, "seek": 0, "start": 0.0, "end": 4.2, "text": " full lecture ",
                 "temperature": 0.0, "avg_logprob": -0.3, "no_speech_prob": 0.01},
                {"id": 1, "seek": 0, "start": 4.2, "end": 6.0, "text": " text",
                 "temperature": 0.0, "avg_logprob": -0.2, "no_speech_prob": 0.02}
            ]
        }"#;

        let parsed: WhisperJson = serde_json::from_str(raw).unwrap();
        let transcript: Transcript = parsed.into();

        assert_eq!(transcript.full_text, "full lecture text");
        assert_eq!(transcript.segments[0].text, "full lecture");
        assert_eq!(transcript.segments[1].end, 6.0);
    }
}
