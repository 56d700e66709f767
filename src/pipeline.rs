use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::acquisition::{validate_single_video_url, VideoAcquirer};
use crate::audio::AudioExtractor;
use crate::config::Config;
use crate::context;
use crate::error::{PipelineError, Result};
use crate::identity::VideoId;
use crate::status::{PipelineStatus, Stage, StatusTracker};
use crate::store::TranscriptStore;
use crate::transcription::{build_transcriber, Transcriber, Transcript};

const JOB_QUEUE_DEPTH: usize = 64;

/// How a job's video bytes arrive
#[derive(Debug, Clone)]
enum JobSource {
    /// Already written to local storage by the upload endpoint
    Upload { video_path: PathBuf },
    /// To be downloaded from a validated remote URL
    Remote { url: String },
}

/// One unit of work for the background worker pool
#[derive(Debug, Clone)]
struct JobDescriptor {
    id: VideoId,
    source: JobSource,
}

/// Outcome of submitting a remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSubmission {
    /// A background job was queued; poll the status tracker
    Started(VideoId),
    /// A persisted transcript already existed and was served from the store
    Cached(VideoId),
}

impl RemoteSubmission {
    pub fn id(&self) -> &VideoId {
        match self {
            RemoteSubmission::Started(id) | RemoteSubmission::Cached(id) => id,
        }
    }
}

/// The transcription pipeline: submission API, background worker pool, and
/// the status/store services the excluded HTTP collaborators read from.
///
/// Submission is fire-and-forget: callers get an identifier immediately and
/// poll `status()` until it turns terminal. Each job walks
/// download → extract → transcribe → persist strictly in order; any stage
/// failure is converted to a terminal error status, never a panic.
pub struct Pipeline {
    worker: Arc<Worker>,
    jobs: mpsc::Sender<JobDescriptor>,
}

struct Worker {
    status: StatusTracker,
    store: TranscriptStore,
    acquirer: VideoAcquirer,
    extractor: AudioExtractor,
    transcriber: Arc<dyn Transcriber>,
}

impl Pipeline {
    pub async fn new(config: Config) -> Result<Self> {
        config.prepare_storage().await.map_err(|e| {
            PipelineError::InvalidInput(format!("storage directories unavailable: {}", e))
        })?;

        let transcriber = build_transcriber(&config.transcription).await;
        let worker = Arc::new(Worker {
            status: StatusTracker::new(),
            store: TranscriptStore::new(&config.storage.transcript_dir).await?,
            acquirer: VideoAcquirer::new(config.acquisition.clone(), &config.storage.media_dir),
            extractor: AudioExtractor::new(),
            transcriber,
        });

        let (jobs, rx) = mpsc::channel(JOB_QUEUE_DEPTH);
        Self::spawn_dispatcher(Arc::clone(&worker), rx, config.pipeline.max_workers);

        Ok(Self { worker, jobs })
    }

    /// Dispatcher: drains the job channel into per-job tasks, bounded by a
    /// semaphore so a burst of submissions cannot fork unbounded work.
    fn spawn_dispatcher(
        worker: Arc<Worker>,
        mut rx: mpsc::Receiver<JobDescriptor>,
        max_workers: usize,
    ) {
        let permits = Arc::new(Semaphore::new(max_workers.max(1)));

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                    break;
                };
                let worker = Arc::clone(&worker);

                tokio::spawn(async move {
                    let _permit = permit;
                    worker.run_job(job).await;
                });
            }
            debug!("Job channel closed, dispatcher exiting");
        });
    }

    /// Accept an uploaded video and queue its transcription job.
    /// Validation failures reject synchronously; no job is created.
    pub async fn submit_upload(&self, bytes: &[u8], filename: &str) -> Result<VideoId> {
        let (id, video_path) = self.worker.acquirer.save_upload(bytes, filename).await?;

        self.worker.status.set(&id, PipelineStatus::queued()).await;
        self.enqueue(JobDescriptor {
            id: id.clone(),
            source: JobSource::Upload { video_path },
        })
        .await?;

        Ok(id)
    }

    /// Validate a remote URL and queue its pipeline job.
    ///
    /// If a transcript for this exact URL string was already persisted, the
    /// store serves it and neither the downloader nor the transcription
    /// backend runs again.
    pub async fn submit_remote(&self, url: &str) -> Result<RemoteSubmission> {
        validate_single_video_url(url)?;
        let id = VideoId::for_url(url);

        if self.worker.store.exists(&id).await {
            info!("📋 Transcript already on disk for {}, serving cached", id);
            self.worker.store.load(&id).await?;
            self.worker.status.set(&id, PipelineStatus::completed()).await;
            return Ok(RemoteSubmission::Cached(id));
        }

        // Refuse over-long videos before a single download byte moves.
        self.worker.acquirer.check_duration(url).await?;

        self.worker.status.set(&id, PipelineStatus::queued()).await;
        self.enqueue(JobDescriptor {
            id: id.clone(),
            source: JobSource::Remote { url: url.to_string() },
        })
        .await?;

        Ok(RemoteSubmission::Started(id))
    }

    async fn enqueue(&self, job: JobDescriptor) -> Result<()> {
        self.jobs
            .send(job)
            .await
            .map_err(|_| PipelineError::Acquisition("job queue closed".to_string()))
    }

    /// Current status snapshot for an identifier
    pub async fn status(&self, id: &VideoId) -> PipelineStatus {
        self.worker.status.get(id).await
    }

    /// Completed transcript for an identifier
    pub async fn transcript(&self, id: &VideoId) -> Result<Arc<Transcript>> {
        self.worker.store.load(id).await
    }

    /// Transcript context at a playback timestamp, for the Q&A collaborator
    pub async fn context(&self, id: &VideoId, at_seconds: f64) -> String {
        context::context_at(&self.worker.store, id, at_seconds).await
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.worker.store
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.worker.status
    }
}

impl Worker {
    /// Job boundary: every stage error ends up as a terminal error status
    /// with a human-readable cause and is never re-raised.
    async fn run_job(&self, job: JobDescriptor) {
        let id = job.id.clone();
        info!("🚀 Job started: {}", id);

        match self.execute(job).await {
            Ok(()) => info!("🎉 Job completed: {}", id),
            Err(e) => {
                warn!("❌ Job failed: {}: {}", id, e);
                // Progress must not regress on the error transition; keep
                // the last value the job reported.
                let progress = self.status.get(&id).await.progress;
                let mut status = PipelineStatus::error(e.to_string());
                status.progress = progress;
                self.status.set(&id, status).await;
            }
        }
    }

    async fn execute(&self, job: JobDescriptor) -> Result<()> {
        let id = job.id;

        let video_path = match job.source {
            JobSource::Remote { url } => {
                self.status
                    .set(&id, PipelineStatus::new(Stage::Downloading, 0))
                    .await;
                self.acquirer.download(&url, &id, &self.status).await?
            }
            JobSource::Upload { video_path } => {
                self.status
                    .set(&id, PipelineStatus::new(Stage::Processing, 10))
                    .await;
                video_path
            }
        };

        self.status
            .set(
                &id,
                PipelineStatus::new(Stage::Processing, 30).with_message("extracting audio"),
            )
            .await;

        let audio_path = self.acquirer.audio_path(&id);
        self.extractor.extract(&video_path, &audio_path).await?;

        self.status
            .set(&id, PipelineStatus::new(Stage::Processing, 35))
            .await;

        let result = self
            .transcriber
            .transcribe(&audio_path, &id, &self.status)
            .await;

        // The extracted audio is job-scoped scratch; drop it whether or
        // not transcription succeeded.
        if let Err(e) = tokio::fs::remove_file(&audio_path).await {
            debug!("Audio cleanup skipped for {}: {}", audio_path.display(), e);
        }

        let transcript = result?;
        self.store.save(&id, transcript).await?;
        self.status.set(&id, PipelineStatus::completed()).await;

        Ok(())
    }
}
