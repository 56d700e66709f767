use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::identity::VideoId;

/// Pipeline stage of a tracked job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Queued,
    Downloading,
    Processing,
    Completed,
    Error,
    /// Returned for identifiers the tracker has never seen
    Unknown,
}

/// Current status snapshot for one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub stage: Stage,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineStatus {
    pub fn new(stage: Stage, progress: u8) -> Self {
        Self {
            stage,
            progress,
            message: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn queued() -> Self {
        Self::new(Stage::Queued, 0)
    }

    pub fn completed() -> Self {
        Self::new(Stage::Completed, 100)
    }

    pub fn error(cause: impl Into<String>) -> Self {
        Self {
            stage: Stage::Error,
            progress: 0,
            message: None,
            error: Some(cause.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.stage, Stage::Completed | Stage::Error)
    }
}

/// Process-wide mapping from video identifier to current pipeline status.
///
/// Each identifier is written by exactly one background job at a time, so a
/// wholesale last-write-wins overwrite behind the lock is enough. No history
/// is retained, only the current snapshot.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    statuses: Arc<RwLock<HashMap<VideoId, PipelineStatus>>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the status for an identifier
    pub async fn set(&self, id: &VideoId, status: PipelineStatus) {
        debug!("📊 Status {}: {:?} {}%", id, status.stage, status.progress);
        self.statuses.write().await.insert(id.clone(), status);
    }

    /// Snapshot the status for an identifier; never-seen ids report Unknown
    pub async fn get(&self, id: &VideoId) -> PipelineStatus {
        self.statuses
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_else(|| PipelineStatus::new(Stage::Unknown, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_id_reports_unknown_stage() {
        let tracker = StatusTracker::new();
        let status = tracker.get(&VideoId::for_url("https://example.com/v")).await;
        assert_eq!(status.stage, Stage::Unknown);
        assert_eq!(status.progress, 0);
    }

    #[tokio::test]
    async fn set_overwrites_wholesale() {
        let tracker = StatusTracker::new();
        let id = VideoId::for_url("https://example.com/v");

        tracker
            .set(&id, PipelineStatus::new(Stage::Downloading, 12).with_message("fetching"))
            .await;
        tracker.set(&id, PipelineStatus::new(Stage::Processing, 35)).await;

        let status = tracker.get(&id).await;
        assert_eq!(status.stage, Stage::Processing);
        assert_eq!(status.progress, 35);
        // no partial merge: the old message does not survive the overwrite
        assert!(status.message.is_none());
    }

    #[tokio::test]
    async fn error_status_is_terminal_and_carries_cause() {
        let tracker = StatusTracker::new();
        let id = VideoId::for_url("https://example.com/v");

        tracker.set(&id, PipelineStatus::error("download failed")).await;

        let status = tracker.get(&id).await;
        assert!(status.is_terminal());
        assert_eq!(status.error.as_deref(), Some("download failed"));
    }
}
