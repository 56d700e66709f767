use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the lecture transcription pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Media and transcript storage locations
    pub storage: StorageConfig,

    /// Remote acquisition settings
    pub acquisition: AcquisitionConfig,

    /// Transcription backend settings
    pub transcription: TranscriptionConfig,

    /// Worker pool settings
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for downloaded/uploaded videos and extracted audio
    pub media_dir: PathBuf,

    /// Directory for persisted transcript JSON files
    pub transcript_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Path to the yt-dlp binary
    pub yt_dlp_path: String,

    /// Optional cookies file handed to yt-dlp when present
    pub cookies_file: Option<PathBuf>,

    /// Maximum remote video duration in seconds
    pub max_video_duration_secs: u64,

    /// Timeout for the pre-download duration probe (seconds)
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Which backend transcribes audio
    pub backend: TranscriptionBackend,

    /// Remote API endpoint for audio transcription
    pub api_endpoint: String,

    /// API key for the remote backend
    pub api_key: Option<String>,

    /// Remote upload size limit in bytes; larger files are chunked
    pub upload_limit_bytes: u64,

    /// Chunk duration in seconds for oversized audio
    pub chunk_duration_secs: u64,

    /// Local whisper model size (tiny, base, small, ...)
    pub model_size: String,

    /// Fixed language hint for the local backend
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionBackend {
    Remote,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of concurrently running jobs
    pub max_workers: usize,
}

impl Config {
    /// Load configuration from file, falling back to env-seeded defaults
    pub fn load() -> Result<Self> {
        let config_paths = [
            "lecture-scribe.toml",
            "config/lecture-scribe.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config.apply_env_overrides();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables override file values
    fn apply_env_overrides(&mut self) {
        if let Ok(max) = std::env::var("LS_MAX_DURATION") {
            if let Ok(secs) = max.parse() {
                self.acquisition.max_video_duration_secs = secs;
            }
        }

        if let Ok(backend) = std::env::var("LS_BACKEND") {
            match backend.to_lowercase().as_str() {
                "local" => self.transcription.backend = TranscriptionBackend::Local,
                "remote" => self.transcription.backend = TranscriptionBackend::Remote,
                other => tracing::warn!("Unknown LS_BACKEND value: {}", other),
            }
        }

        if let Ok(size) = std::env::var("LS_MODEL_SIZE") {
            self.transcription.model_size = size;
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.transcription.api_key = Some(key);
        }

        if let Ok(workers) = std::env::var("LS_WORKERS") {
            if let Ok(n) = workers.parse() {
                self.pipeline.max_workers = n;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if self.transcription.chunk_duration_secs == 0 {
            return Err(anyhow!("chunk_duration_secs must be greater than 0"));
        }

        if self.transcription.backend == TranscriptionBackend::Remote
            && self.transcription.api_key.is_none()
        {
            return Err(anyhow!("API key required for the remote transcription backend"));
        }

        Ok(())
    }

    /// Ensure storage directories exist
    pub async fn prepare_storage(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.storage.media_dir).await?;
        tokio::fs::create_dir_all(&self.storage.transcript_dir).await?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                media_dir: PathBuf::from("./uploads"),
                transcript_dir: PathBuf::from("./transcripts"),
            },
            acquisition: AcquisitionConfig {
                yt_dlp_path: "yt-dlp".to_string(),
                cookies_file: Some(PathBuf::from("cookies.txt")),
                max_video_duration_secs: 300, // 5 minutes
                probe_timeout_secs: 30,
            },
            transcription: TranscriptionConfig {
                backend: TranscriptionBackend::Remote,
                api_endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
                api_key: None,
                upload_limit_bytes: 25 * 1024 * 1024,
                chunk_duration_secs: 120,
                model_size: "base".to_string(),
                language: "en".to_string(),
            },
            pipeline: PipelineConfig {
                max_workers: num_cpus::get().min(8),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_service_limits() {
        let config = Config::default();
        assert_eq!(config.acquisition.max_video_duration_secs, 300);
        assert_eq!(config.transcription.upload_limit_bytes, 26_214_400);
        assert_eq!(config.transcription.chunk_duration_secs, 120);
    }

    #[test]
    fn remote_backend_requires_api_key() {
        let mut config = Config::default();
        config.transcription.backend = TranscriptionBackend::Remote;
        config.transcription.api_key = None;
        assert!(config.validate().is_err());

        config.transcription.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }
}
