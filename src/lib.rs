/// Lecture Scribe
///
/// Transcription pipeline for lecture videos: acquires a video by upload or
/// remote download, extracts its audio track, transcribes it through a
/// remote API or a local model, and persists time-aligned transcripts for
/// timestamp-scoped question answering.

pub mod acquisition;
pub mod audio;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod status;
pub mod store;
pub mod transcription;

// Re-export main types for easy access
pub use crate::acquisition::VideoAcquirer;
pub use crate::audio::AudioExtractor;
pub use crate::config::{Config, TranscriptionBackend};
pub use crate::context::context_at;
pub use crate::error::{PipelineError, Result};
pub use crate::identity::VideoId;
pub use crate::pipeline::{Pipeline, RemoteSubmission};
pub use crate::status::{PipelineStatus, Stage, StatusTracker};
pub use crate::store::TranscriptStore;
pub use crate::transcription::{Segment, Transcriber, Transcript};
