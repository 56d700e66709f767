use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::identity::VideoId;
use crate::transcription::Transcript;

/// Durable transcript persistence with an in-memory read-through cache.
///
/// One UTF-8 JSON file per identifier under the transcript directory, shape
/// `{"full_text": ..., "segments": [{"start","end","text"}, ...]}`.
/// Transcripts are immutable once saved; the cache is never evicted, which
/// is acceptable at the target scale.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    transcript_dir: PathBuf,
    cache: Arc<RwLock<HashMap<VideoId, Arc<Transcript>>>>,
}

impl TranscriptStore {
    pub async fn new(transcript_dir: impl Into<PathBuf>) -> Result<Self> {
        let transcript_dir = transcript_dir.into();
        tokio::fs::create_dir_all(&transcript_dir).await?;

        Ok(Self {
            transcript_dir,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn path_for(&self, id: &VideoId) -> PathBuf {
        self.transcript_dir.join(format!("{}.json", id))
    }

    /// Whether a transcript exists on the durable layer
    pub async fn exists(&self, id: &VideoId) -> bool {
        tokio::fs::try_exists(self.path_for(id)).await.unwrap_or(false)
    }

    /// Persist a transcript and mirror it into the cache. The operation
    /// only counts as succeeded once the file write has; a failed write
    /// leaves the cache untouched.
    pub async fn save(&self, id: &VideoId, transcript: Transcript) -> Result<Arc<Transcript>> {
        let path = self.path_for(id);
        let json = serde_json::to_string_pretty(&transcript).map_err(|e| PipelineError::Store {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        tokio::fs::write(&path, json).await.map_err(|e| PipelineError::Store {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let transcript = Arc::new(transcript);
        self.cache.write().await.insert(id.clone(), Arc::clone(&transcript));

        info!("💾 Transcript saved: {}", path.display());
        Ok(transcript)
    }

    /// Load a transcript, serving from cache when possible and reading
    /// through to disk otherwise.
    pub async fn load(&self, id: &VideoId) -> Result<Arc<Transcript>> {
        if let Some(cached) = self.cache.read().await.get(id) {
            debug!("📋 Transcript cache hit: {}", id);
            return Ok(Arc::clone(cached));
        }

        let path = self.path_for(id);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| PipelineError::Store {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let transcript: Transcript =
            serde_json::from_str(&content).map_err(|e| PipelineError::Store {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let transcript = Arc::new(transcript);
        self.cache.write().await.insert(id.clone(), Arc::clone(&transcript));

        debug!("📁 Transcript loaded from disk: {}", path.display());
        Ok(transcript)
    }

    pub fn transcript_dir(&self) -> &Path {
        &self.transcript_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::Segment;

    fn sample() -> Transcript {
        Transcript {
            full_text: "hello world".to_string(),
            segments: vec![Segment {
                start: 0.0,
                end: 2.0,
                text: "hello world".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).await.unwrap();
        let id = VideoId::for_url("https://example.com/lecture");

        assert!(!store.exists(&id).await);
        store.save(&id, sample()).await.unwrap();
        assert!(store.exists(&id).await);

        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded.full_text, "hello world");
        assert_eq!(loaded.segments.len(), 1);
    }

    #[tokio::test]
    async fn load_reads_through_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let id = VideoId::for_url("https://example.com/lecture");

        // Write the durable file via one store instance, read via a fresh
        // one so the first load must hit the disk.
        {
            let store = TranscriptStore::new(dir.path()).await.unwrap();
            store.save(&id, sample()).await.unwrap();
        }

        let store = TranscriptStore::new(dir.path()).await.unwrap();
        let first = store.load(&id).await.unwrap();

        // Removing the durable file leaves cached reads intact.
        tokio::fs::remove_file(store.path_for(&id)).await.unwrap();
        let second = store.load(&id).await.unwrap();
        assert_eq!(first.full_text, second.full_text);
    }

    #[tokio::test]
    async fn loading_unknown_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).await.unwrap();
        let id = VideoId::for_url("https://example.com/missing");

        assert!(store.load(&id).await.is_err());
    }

    #[tokio::test]
    async fn persisted_file_matches_wire_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).await.unwrap();
        let id = VideoId::for_url("https://example.com/lecture");

        store.save(&id, sample()).await.unwrap();

        let raw = tokio::fs::read_to_string(store.path_for(&id)).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["full_text"].is_string());
        assert!(value["segments"][0]["start"].is_number());
        assert!(value["segments"][0]["end"].is_number());
        assert!(value["segments"][0]["text"].is_string());
    }
}
