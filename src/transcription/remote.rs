use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::audio::AudioExtractor;
use crate::config::TranscriptionConfig;
use crate::error::{PipelineError, Result};
use crate::identity::VideoId;
use crate::status::{PipelineStatus, Stage, StatusTracker};

use super::{merge_chunk_into, plan_chunks, Segment, Transcriber, Transcript};

const REMOTE_MODEL: &str = "whisper-1";

/// Whisper transcription over an OpenAI-compatible HTTP API.
///
/// Files at or under the upload limit go up in a single request; larger
/// files are sliced into fixed-duration chunks that are transcribed
/// sequentially and merged with globalized timestamps.
pub struct RemoteApiTranscriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    upload_limit_bytes: u64,
    chunk_duration_secs: u64,
    audio: AudioExtractor,
}

impl RemoteApiTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Self {
        if config.api_key.is_none() {
            warn!("Remote transcription backend constructed without an API key");
        }

        Self {
            client: reqwest::Client::new(),
            endpoint: config.api_endpoint.clone(),
            api_key: config.api_key.clone(),
            upload_limit_bytes: config.upload_limit_bytes,
            chunk_duration_secs: config.chunk_duration_secs,
            audio: AudioExtractor::new(),
        }
    }

    /// One multipart call against the transcription endpoint, requesting
    /// segment-level timestamps.
    async fn transcribe_file(&self, audio_path: &Path) -> Result<Transcript> {
        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", REMOTE_MODEL)
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Transcription(format!(
                "transcription API returned {}: {}",
                status,
                body.chars().take(200).collect::<String>(),
            )));
        }

        let verbose: VerboseTranscription = response.json().await?;
        Ok(verbose.into())
    }

    async fn transcribe_direct(
        &self,
        audio_path: &Path,
        id: &VideoId,
        status: &StatusTracker,
    ) -> Result<Transcript> {
        status.set(id, PipelineStatus::new(Stage::Processing, 50)).await;
        let transcript = self.transcribe_file(audio_path).await?;
        status.set(id, PipelineStatus::new(Stage::Processing, 90)).await;
        Ok(transcript)
    }

    async fn transcribe_chunked(
        &self,
        audio_path: &Path,
        id: &VideoId,
        status: &StatusTracker,
    ) -> Result<Transcript> {
        status
            .set(id, PipelineStatus::new(Stage::Processing, 40).with_message("chunking audio"))
            .await;

        let total_secs = self.audio.probe_duration(audio_path).await?;
        let plan = plan_chunks(total_secs, self.chunk_duration_secs);
        let chunk_dir = audio_path.parent().unwrap_or_else(|| Path::new("."));

        info!(
            "✂️ Audio exceeds upload limit, transcribing {} chunks of {}s ({:.0}s total)",
            plan.len(),
            self.chunk_duration_secs,
            total_secs,
        );

        let mut merged = Transcript::default();
        let total_chunks = plan.len();

        // Strictly sequential: keeps progress monotonic and avoids
        // hammering the backend with parallel uploads.
        for (i, (start, length)) in plan.into_iter().enumerate() {
            let progress = 45.0 + (i as f64 / total_chunks as f64) * 40.0;
            status
                .set(
                    id,
                    PipelineStatus::new(Stage::Processing, progress.floor() as u8)
                        .with_message(format!("transcribing chunk {}/{}", i + 1, total_chunks)),
                )
                .await;

            let chunk_path = chunk_dir.join(format!("{}_chunk{:03}.mp3", id, i));

            let result = match self.audio.cut_chunk(audio_path, start, length, &chunk_path).await {
                Ok(()) => self.transcribe_file(&chunk_path).await,
                Err(e) => Err(e),
            };

            // The chunk file is dead weight once its call has returned,
            // success or failure.
            let _ = tokio::fs::remove_file(&chunk_path).await;

            match result {
                Ok(chunk) => merge_chunk_into(&mut merged, start, chunk),
                Err(e) => {
                    sweep_chunk_files(chunk_dir, id).await;
                    return Err(PipelineError::Transcription(format!(
                        "chunk {}/{} failed: {}",
                        i + 1,
                        total_chunks,
                        e,
                    )));
                }
            }
        }

        status.set(id, PipelineStatus::new(Stage::Processing, 90)).await;
        Ok(merged)
    }
}

#[async_trait]
impl Transcriber for RemoteApiTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        id: &VideoId,
        status: &StatusTracker,
    ) -> Result<Transcript> {
        let file_size = tokio::fs::metadata(audio_path).await?.len();

        if file_size <= self.upload_limit_bytes {
            debug!("📤 Direct upload ({} bytes)", file_size);
            self.transcribe_direct(audio_path, id, status).await
        } else {
            self.transcribe_chunked(audio_path, id, status).await
        }
    }

    fn name(&self) -> &'static str {
        "remote-api"
    }
}

/// Remove every leftover chunk file for an identifier. Invoked on the
/// chunked path's failure exit so repeated failed jobs cannot accumulate
/// temporary audio on disk.
pub(crate) async fn sweep_chunk_files(dir: &Path, id: &VideoId) {
    let prefix = format!("{}_chunk", id);

    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".mp3") {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                warn!("Failed to sweep chunk file {}: {}", name, e);
            }
        }
    }
}

/// `verbose_json` response shape from the transcription API
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
}

impl From<VerboseTranscription> for Transcript {
    fn from(verbose: VerboseTranscription) -> Self {
        Transcript {
            full_text: verbose.text,
            segments: verbose
                .segments
                .into_iter()
                .map(|s| Segment {
                    start: s.start,
                    end: s.end,
                    text: s.text,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_json_parses_into_transcript() {
        let raw = r#"{
            "task": "transcribe",
            "text": "hello world",
            "segments": [
                {"id": 0, "start": 0.0, "end": 2.5, "text": "hello"},
                {"id": 1, "start": 2.5, "end": 5.0, "text": "world"}
            ]
        }"#;

        let verbose: VerboseTranscription = serde_json::from_str(raw).unwrap();
        let transcript: Transcript = verbose.into();

        assert_eq!(transcript.full_text, "hello world");
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[1].start, 2.5);
    }

    #[test]
    fn segments_field_may_be_absent() {
        let verbose: VerboseTranscription =
            serde_json::from_str(r#"{"text": "no timestamps"}"#).unwrap();
        let transcript: Transcript = verbose.into();
        assert!(transcript.segments.is_empty());
    }

    #[tokio::test]
    async fn sweep_removes_only_matching_chunk_files() {
        let dir = tempfile::tempdir().unwrap();
        let id = VideoId::for_url("https://example.com/lecture");
        let other = VideoId::for_url("https://example.com/other");

        let keep_audio = dir.path().join(format!("{}.mp3", id));
        let keep_other = dir.path().join(format!("{}_chunk000.mp3", other));
        let doomed_a = dir.path().join(format!("{}_chunk000.mp3", id));
        let doomed_b = dir.path().join(format!("{}_chunk001.mp3", id));

        for p in [&keep_audio, &keep_other, &doomed_a, &doomed_b] {
            tokio::fs::write(p, b"x").await.unwrap();
        }

        sweep_chunk_files(dir.path(), &id).await;

        assert!(keep_audio.exists());
        assert!(keep_other.exists());
        assert!(!doomed_a.exists());
        assert!(!doomed_b.exists());
    }
}
