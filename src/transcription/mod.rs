pub mod local;
pub mod remote;

pub use local::LocalWhisperTranscriber;
pub use remote::RemoteApiTranscriber;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{TranscriptionBackend, TranscriptionConfig};
use crate::error::Result;
use crate::identity::VideoId;
use crate::status::StatusTracker;

/// A transcript fragment with start/end timestamps in seconds.
///
/// Segments are time-ordered as produced, but `segments[i].end <=
/// segments[i+1].start` is not guaranteed by the source tools and is
/// tolerated, never assumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Complete transcription result for one video
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub full_text: String,
    pub segments: Vec<Segment>,
}

/// Speech-to-text backend over one audio file.
///
/// Implementations report coarse progress for the 35-90 band through the
/// status tracker; the surrounding pipeline owns every other stage boundary.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
        id: &VideoId,
        status: &StatusTracker,
    ) -> Result<Transcript>;

    fn name(&self) -> &'static str;
}

/// Select the transcription backend once, at process start.
///
/// A local request with no usable whisper CLI falls back to the remote API
/// rather than erroring; the choice is never revisited per request.
pub async fn build_transcriber(config: &TranscriptionConfig) -> Arc<dyn Transcriber> {
    match config.backend {
        TranscriptionBackend::Local => {
            if LocalWhisperTranscriber::available().await {
                info!("🎤 Transcription backend: local whisper ({})", config.model_size);
                Arc::new(LocalWhisperTranscriber::new(config))
            } else {
                warn!("Local whisper CLI unavailable, falling back to remote API");
                Arc::new(RemoteApiTranscriber::new(config))
            }
        }
        TranscriptionBackend::Remote => {
            info!("🎤 Transcription backend: remote API");
            Arc::new(RemoteApiTranscriber::new(config))
        }
    }
}

/// Planned time slice of an oversized audio file: (start offset, length),
/// both in seconds.
pub(crate) fn plan_chunks(total_secs: f64, chunk_secs: u64) -> Vec<(f64, f64)> {
    let chunk_len = chunk_secs as f64;
    let count = (total_secs / chunk_len).ceil().max(1.0) as usize;

    (0..count)
        .map(|i| {
            let start = i as f64 * chunk_len;
            (start, chunk_len.min(total_secs - start))
        })
        .collect()
}

/// Fold one chunk's transcript into the merged result, globalizing its
/// segment timestamps by the chunk's start offset. The offset is added to
/// both ends, never substituted.
pub(crate) fn merge_chunk_into(merged: &mut Transcript, offset: f64, chunk: Transcript) {
    for seg in chunk.segments {
        merged.segments.push(Segment {
            start: seg.start + offset,
            end: seg.end + offset,
            text: seg.text,
        });
    }

    let text = chunk.full_text.trim();
    if !text.is_empty() {
        if !merged.full_text.is_empty() {
            merged.full_text.push(' ');
        }
        merged.full_text.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Transcript {
        Transcript {
            full_text: text.to_string(),
            segments: vec![Segment {
                start: 0.0,
                end: 5.0,
                text: text.to_string(),
            }],
        }
    }

    #[test]
    fn chunk_offsets_are_additive() {
        let mut merged = Transcript::default();
        merge_chunk_into(&mut merged, 0.0, chunk("a"));
        merge_chunk_into(&mut merged, 120.0, chunk("a"));
        merge_chunk_into(&mut merged, 240.0, chunk("a"));

        let times: Vec<(f64, f64)> = merged.segments.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(times, vec![(0.0, 5.0), (120.0, 125.0), (240.0, 245.0)]);
        assert_eq!(merged.full_text, "a a a");
    }

    #[test]
    fn chunk_plan_covers_partial_tail() {
        let plan = plan_chunks(250.0, 120);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0], (0.0, 120.0));
        assert_eq!(plan[1], (120.0, 120.0));
        assert_eq!(plan[2], (240.0, 10.0));
    }

    #[test]
    fn exact_multiple_total_produces_no_empty_chunk() {
        // 240s at 120s chunks is exactly two slices; an empty trailing
        // chunk would be a request for zero seconds of audio.
        let plan = plan_chunks(240.0, 120);
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|(_, len)| *len > 0.0));
    }

    #[test]
    fn short_audio_is_a_single_chunk() {
        let plan = plan_chunks(30.0, 120);
        assert_eq!(plan, vec![(0.0, 30.0)]);
    }
}
