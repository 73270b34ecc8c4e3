//! Damage detection worker binary.
//!
//! Processes the video paths given on the command line through the
//! admission gate, after repairing any records orphaned by a previous run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use carscan_media::{DrawboxRenderer, FfmpegFrameSource};
use carscan_ml_client::HttpDamageDetector;
use carscan_storage::{JsonDetectionRepository, JsonVideoRepository};
use carscan_worker::{ProcessingGate, ThresholdClassifier, VideoPipeline, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("carscan=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    info!("Starting carscan-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Explicit construction: each collaborator is built once and passed in
    let videos = Arc::new(
        JsonVideoRepository::open(&config.storage_dir)
            .await
            .context("failed to open video repository")?,
    );
    let results = Arc::new(
        JsonDetectionRepository::open(&config.storage_dir)
            .await
            .context("failed to open detection repository")?,
    );
    let detector =
        Arc::new(HttpDamageDetector::from_env().context("failed to build ML client")?);

    let pipeline = Arc::new(VideoPipeline::new(
        config.clone(),
        Arc::new(FfmpegFrameSource::new()),
        detector,
        Arc::new(DrawboxRenderer::new()),
        Arc::new(ThresholdClassifier::default()),
        videos.clone(),
        results,
    ));
    let gate = ProcessingGate::new(pipeline, videos, &config);

    // Recover state left inconsistent by a previous crash
    let repaired = gate
        .reconcile_orphans()
        .await
        .context("orphan reconciliation failed")?;
    if repaired > 0 {
        info!(repaired, "repaired orphaned records from previous run");
    }

    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        info!("No video paths given, nothing to do");
        return Ok(());
    }

    let outcomes = match gate.submit_batch(&paths).await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            error!("batch rejected: {e}");
            std::process::exit(2);
        }
    };

    let mut failures = 0usize;
    for (path, outcome) in paths.iter().zip(outcomes) {
        match outcome {
            Ok(result) => info!(
                path = %path.display(),
                damages = result.damage_count(),
                frames = result.statistics.frames_processed,
                average_confidence = result.statistics.average_confidence,
                "processed"
            ),
            Err(e) => {
                failures += 1;
                error!(path = %path.display(), "processing failed: {e}");
            }
        }
    }

    if failures > 0 {
        error!("{failures} of {} videos failed", paths.len());
        std::process::exit(1);
    }

    Ok(())
}
