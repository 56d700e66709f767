use anyhow::Result;
use clap::{Arg, Command};
use std::time::Duration;
use tracing::{info, warn};

use lecture_scribe::{Config, Pipeline, RemoteSubmission, Stage, VideoId};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("lecture_scribe=info,warn")
        .init();

    let matches = Command::new("Lecture Scribe")
        .version("0.1.0")
        .about("Transcribes lecture videos and answers timestamp-scoped context queries")
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("URL")
                .help("Remote video URL to download and transcribe")
                .conflicts_with("file"),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("PATH")
                .help("Local video file to upload into the pipeline"),
        )
        .arg(
            Arg::new("at")
                .long("at")
                .value_name("SECONDS")
                .help("Print the transcript context window at this playback time")
                .default_value("0"),
        )
        .get_matches();

    let config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    config.validate()?;

    let pipeline = Pipeline::new(config).await?;

    let id = match (
        matches.get_one::<String>("url"),
        matches.get_one::<String>("file"),
    ) {
        (Some(url), None) => match pipeline.submit_remote(url).await? {
            RemoteSubmission::Cached(id) => {
                info!("📋 Transcript already available for {}", id);
                id
            }
            RemoteSubmission::Started(id) => id,
        },
        (None, Some(path)) => {
            let filename = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bytes = tokio::fs::read(path).await?;
            pipeline.submit_upload(&bytes, &filename).await?
        }
        _ => {
            return Err(anyhow::anyhow!("provide exactly one of --url or --file"));
        }
    };

    info!("🎬 Tracking job: {}", id);
    wait_for_terminal(&pipeline, &id).await?;

    let transcript = pipeline.transcript(&id).await?;
    info!(
        "📝 Transcript ready: {} characters, {} segments",
        transcript.full_text.len(),
        transcript.segments.len()
    );

    let at: f64 = matches
        .get_one::<String>("at")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);
    let context = pipeline.context(&id, at).await;
    if !context.is_empty() {
        println!("--- context at {:.0}s ---", at);
        println!("{}", context);
    }

    Ok(())
}

/// Poll the status tracker until the job reaches a terminal stage
async fn wait_for_terminal(pipeline: &Pipeline, id: &VideoId) -> Result<()> {
    let mut last_progress = u8::MAX;

    loop {
        let status = pipeline.status(id).await;

        if status.progress != last_progress {
            info!(
                "⏳ {:?} {}%{}",
                status.stage,
                status.progress,
                status.message.as_deref().map(|m| format!(" ({})", m)).unwrap_or_default()
            );
            last_progress = status.progress;
        }

        match status.stage {
            Stage::Completed => return Ok(()),
            Stage::Error => {
                return Err(anyhow::anyhow!(
                    "pipeline failed: {}",
                    status.error.as_deref().unwrap_or("unknown error")
                ));
            }
            _ => tokio::time::sleep(Duration::from_millis(500)).await,
        }
    }
}
