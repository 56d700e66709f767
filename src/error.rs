use std::path::PathBuf;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error types for the transcription pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not a single-video URL: {0}")]
    InvalidUrl(String),

    #[error("video duration {actual_seconds}s exceeds the configured maximum")]
    DurationExceeded { actual_seconds: u64 },

    #[error("download failed: {0}")]
    Acquisition(String),

    #[error("audio extraction failed: {0}")]
    Extraction(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("transcript store error for {}: {reason}", .path.display())]
    Store { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PipelineError {
    /// Whether the error is rejected synchronously, before a job is queued.
    pub fn is_synchronous_rejection(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidInput(_)
                | PipelineError::InvalidUrl(_)
                | PipelineError::DurationExceeded { .. }
        )
    }
}
