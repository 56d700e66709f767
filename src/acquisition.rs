use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AcquisitionConfig;
use crate::error::{PipelineError, Result};
use crate::identity::VideoId;
use crate::status::{PipelineStatus, Stage, StatusTracker};

/// Download progress occupies the first quarter of overall pipeline
/// progress; the remaining stages own the rest.
const DOWNLOAD_BAND_SCALE: f64 = 0.25;

/// Obtains raw video bytes onto local storage: accepts uploads directly or
/// drives yt-dlp against a remote source with progress reporting.
pub struct VideoAcquirer {
    config: AcquisitionConfig,
    media_dir: PathBuf,
}

impl VideoAcquirer {
    pub fn new(config: AcquisitionConfig, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            media_dir: media_dir.into(),
        }
    }

    pub fn video_path(&self, id: &VideoId) -> PathBuf {
        self.media_dir.join(format!("{}.mp4", id))
    }

    pub fn audio_path(&self, id: &VideoId) -> PathBuf {
        self.media_dir.join(format!("{}.mp3", id))
    }

    /// Persist an uploaded file. Empty filenames and empty payloads are
    /// rejected before anything touches disk.
    pub async fn save_upload(&self, bytes: &[u8], filename: &str) -> Result<(VideoId, PathBuf)> {
        if filename.trim().is_empty() {
            return Err(PipelineError::InvalidInput("no filename provided".to_string()));
        }
        if bytes.is_empty() {
            return Err(PipelineError::InvalidInput("empty video upload".to_string()));
        }

        let id = VideoId::for_upload(filename);
        let path = self.video_path(&id);
        tokio::fs::write(&path, bytes).await?;

        info!("📥 Upload saved: {} ({} bytes) as {}", filename, bytes.len(), id);
        Ok((id, path))
    }

    /// Remote video duration in seconds, probed without downloading.
    ///
    /// `None` means unknown: the probe failed, timed out, or returned
    /// something unparseable. Callers treat unknown as "allow, proceed".
    pub async fn probe_duration(&self, url: &str) -> Option<u64> {
        let probe = Command::new(&self.config.yt_dlp_path)
            .args(["--no-playlist", "--get-duration", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        match tokio::time::timeout(timeout, probe).await {
            Ok(Ok(output)) if output.status.success() => {
                let raw = String::from_utf8_lossy(&output.stdout);
                parse_duration_string(raw.trim())
            }
            Ok(Ok(output)) => {
                debug!("Duration probe exited with {}", output.status);
                None
            }
            Ok(Err(e)) => {
                warn!("Duration probe failed to run: {}", e);
                None
            }
            Err(_) => {
                warn!("Duration probe timed out after {:?}", timeout);
                None
            }
        }
    }

    /// Enforce the maximum-duration policy before any download I/O
    pub async fn check_duration(&self, url: &str) -> Result<()> {
        let probed = self.probe_duration(url).await;
        enforce_duration_limit(probed, self.config.max_video_duration_secs)
    }

    /// Download a remote video with yt-dlp, streaming its textual progress
    /// into the status tracker scaled onto the 0-25 band. A non-zero exit
    /// surfaces as a generic acquisition failure with no retry.
    pub async fn download(
        &self,
        url: &str,
        id: &VideoId,
        status: &StatusTracker,
    ) -> Result<PathBuf> {
        let output_path = self.video_path(id);

        let mut cmd = Command::new(&self.config.yt_dlp_path);
        cmd.args([
            "--no-playlist",
            "-f",
            "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/bv*+ba/b",
            "--newline",
            "--progress",
            "--merge-output-format",
            "mp4",
        ]);

        // Cookies bypass bot checks on some hosts; a missing file is fine.
        if let Some(cookies) = &self.config.cookies_file {
            if cookies.exists() {
                debug!("🍪 Using cookies file: {}", cookies.display());
                cmd.arg("--cookies").arg(cookies);
            }
        }

        cmd.arg("-o").arg(&output_path).arg(url);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        info!("⬇️ Downloading {} as {}", url, id);
        let mut child = cmd.spawn().map_err(|e| {
            PipelineError::Acquisition(format!("failed to spawn downloader: {}", e))
        })?;

        // yt-dlp prints one "[download]  NN.N% ..." line per progress tick
        // when --newline is set.
        let percent_re = Regex::new(r"(\d+(?:\.\d+)?)%").expect("static regex");

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("yt-dlp: {}", line);
                if !line.contains("[download]") {
                    continue;
                }
                if let Some(caps) = percent_re.captures(&line) {
                    if let Ok(percent) = caps[1].parse::<f64>() {
                        let scaled = (percent * DOWNLOAD_BAND_SCALE) as u8;
                        status
                            .set(id, PipelineStatus::new(Stage::Downloading, scaled))
                            .await;
                    }
                }
            }
        }

        let exit = child
            .wait()
            .await
            .map_err(|e| PipelineError::Acquisition(format!("downloader did not exit: {}", e)))?;

        if !exit.success() {
            return Err(PipelineError::Acquisition("download failed".to_string()));
        }

        status.set(id, PipelineStatus::new(Stage::Downloading, 25)).await;
        info!("✅ Download complete: {}", output_path.display());
        Ok(output_path)
    }
}

/// Validate that a URL is a plausible single-video reference.
///
/// Channel, playlist, search, and user-feed shapes are rejected with a
/// dedicated error so callers can distinguish bad requests from download
/// failures.
pub fn validate_single_video_url(raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(PipelineError::InvalidInput("no URL provided".to_string()));
    }

    let url = Url::parse(raw)
        .map_err(|e| PipelineError::InvalidUrl(format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PipelineError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| PipelineError::InvalidUrl(format!("no host in {}", raw)))?
        .to_ascii_lowercase();

    let path = url.path();
    let first_segment = path.trim_start_matches('/').split('/').next().unwrap_or("");

    // Collection shapes are never a single video, on any host.
    let collection_segments = ["playlist", "channel", "results", "feed", "user", "c"];
    if collection_segments.contains(&first_segment) || first_segment.starts_with('@') {
        return Err(PipelineError::InvalidUrl(format!(
            "'{}' refers to a collection, not a single video",
            raw
        )));
    }

    if is_youtube_host(&host) && !has_youtube_video_reference(&url, &host) {
        return Err(PipelineError::InvalidUrl(format!(
            "'{}' does not reference a single video",
            raw
        )));
    }

    Ok(url)
}

fn is_youtube_host(host: &str) -> bool {
    host == "youtube.com"
        || host == "youtu.be"
        || host.ends_with(".youtube.com")
}

fn has_youtube_video_reference(url: &Url, host: &str) -> bool {
    if host == "youtu.be" {
        return url.path().len() > 1;
    }

    if url.path() == "/watch" {
        return url.query_pairs().any(|(k, v)| k == "v" && !v.is_empty());
    }

    let mut segments = url.path().trim_start_matches('/').split('/');
    let kind = segments.next().unwrap_or("");
    let id = segments.next().unwrap_or("");
    matches!(kind, "shorts" | "embed" | "v") && !id.is_empty()
}

/// An unknown duration allows the download to proceed; only a measured
/// duration over the limit refuses it.
pub(crate) fn enforce_duration_limit(probed: Option<u64>, max_secs: u64) -> Result<()> {
    match probed {
        Some(actual_seconds) if actual_seconds > max_secs => {
            Err(PipelineError::DurationExceeded { actual_seconds })
        }
        Some(secs) => {
            debug!("Duration probe: {}s, within limit", secs);
            Ok(())
        }
        None => Ok(()),
    }
}

/// Parse yt-dlp duration output: `SS`, `M:SS`, or `H:MM:SS`
pub(crate) fn parse_duration_string(raw: &str) -> Option<u64> {
    let parts: Vec<&str> = raw.split(':').collect();
    let nums: Vec<u64> = parts.iter().map(|p| p.parse().ok()).collect::<Option<_>>()?;

    match nums.as_slice() {
        [s] => Some(*s),
        [m, s] => Some(m * 60 + s),
        [h, m, s] => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}
