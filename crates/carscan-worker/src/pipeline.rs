//! Video lifecycle orchestration.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use metrics::counter;
use tracing::{debug, info, warn};

use carscan_media::{validate_source, FrameSource, VideoRenderer};
use carscan_ml_client::DamageDetector;
use carscan_models::{
    BoundingBox, Damage, DamageType, DetectionResult, DetectionStatistics, Video, VideoMetadata,
};
use carscan_storage::{DetectionStore, VideoStore};

use crate::config::WorkerConfig;
use crate::error::{ProcessError, ProcessResult};
use crate::severity::SeverityClassifier;
use crate::stats::StatsCollector;

/// Drives one video through the full detection lifecycle:
/// validate -> await model -> detect -> annotate -> persist.
///
/// Not aware of admission control; [`crate::ProcessingGate`] guarantees at
/// most one in-flight run per source path.
pub struct VideoPipeline {
    config: WorkerConfig,
    frames: Arc<dyn FrameSource>,
    detector: Arc<dyn DamageDetector>,
    renderer: Arc<dyn VideoRenderer>,
    classifier: Arc<dyn SeverityClassifier>,
    videos: Arc<dyn VideoStore>,
    results: Arc<dyn DetectionStore>,
}

impl VideoPipeline {
    /// Wire up a pipeline from its collaborators. Each is built once at
    /// startup and shared by reference.
    pub fn new(
        config: WorkerConfig,
        frames: Arc<dyn FrameSource>,
        detector: Arc<dyn DamageDetector>,
        renderer: Arc<dyn VideoRenderer>,
        classifier: Arc<dyn SeverityClassifier>,
        videos: Arc<dyn VideoStore>,
        results: Arc<dyn DetectionStore>,
    ) -> Self {
        Self {
            config,
            frames,
            detector,
            renderer,
            classifier,
            videos,
            results,
        }
    }

    /// Process one video end to end.
    ///
    /// Validation failures reject the call before any record exists. Once
    /// the video record is created, any subsequent error marks it `Failed`
    /// (best effort) and is then propagated unmodified. Repeated calls for
    /// the same path create distinct video ids; deduplication is the
    /// gate's responsibility.
    pub async fn execute(
        &self,
        path: &Path,
        confidence_threshold: f64,
        annotate: bool,
    ) -> ProcessResult<DetectionResult> {
        // Validating: cheap checks first, then the probe
        validate_source(path, self.config.max_video_size_bytes()).await?;
        let metadata = self.frames.probe(path).await?;

        // AwaitingModel: prepare is idempotent on an already-loaded model
        if !self.detector.ready().await {
            self.detector
                .prepare()
                .await
                .map_err(|e| ProcessError::model_unavailable(e.to_string()))?;
        }

        let mut video = Video::new(path, Some(metadata.clone()));
        self.videos.save(&video).await?;
        info!(
            video_id = %video.id,
            path = %path.display(),
            frames = metadata.frame_count,
            "video admitted for detection"
        );

        let started = Instant::now();
        match self
            .detect_and_persist(&mut video, &metadata, confidence_threshold, annotate, started)
            .await
        {
            Ok(result) => Ok(result),
            Err(err) => {
                self.fail_video(&mut video, &err).await;
                Err(err)
            }
        }
    }

    /// Everything that runs after the video record exists. An error from
    /// here leaves the record to be marked `Failed` by the caller.
    async fn detect_and_persist(
        &self,
        video: &mut Video,
        metadata: &VideoMetadata,
        confidence_threshold: f64,
        annotate: bool,
        started: Instant,
    ) -> ProcessResult<DetectionResult> {
        let (damages, statistics) = self
            .run_frame_loop(video, metadata, confidence_threshold, started)
            .await?;

        let mut result = DetectionResult::new(
            video.id.clone(),
            video.file_path.clone(),
            damages,
            statistics,
            self.detector.model_version(),
            confidence_threshold,
        )?;

        // Annotating: a renderer failure downgrades to a missing artifact
        if annotate && result.has_damages() {
            let output = self.config.annotated_output_path(video.path());
            let grouped = group_by_frame(&result.damages);
            match self
                .renderer
                .render_annotated(video.path(), &grouped, &output)
                .await
            {
                Ok(rendered) => result.annotated_path = Some(rendered),
                Err(err) => {
                    warn!(video_id = %video.id, "annotation render failed: {err}");
                }
            }
        }

        // Persisting: result first so a failing video write still leaves a
        // non-terminal record for the failure path
        self.results.save(&result).await?;
        video.mark_completed(
            result.damages.clone(),
            result.statistics.processing_time_secs,
        )?;
        self.videos.update(video).await?;

        counter!("carscan_videos_processed_total", "outcome" => "completed").increment(1);
        info!(
            video_id = %video.id,
            damages = result.damage_count(),
            frames = result.statistics.frames_processed,
            "video processing completed"
        );
        Ok(result)
    }

    /// The strictly sequential frame loop. Ordering matters: timestamps and
    /// running aggregates depend on it.
    async fn run_frame_loop(
        &self,
        video: &Video,
        metadata: &VideoMetadata,
        confidence_threshold: f64,
        started: Instant,
    ) -> ProcessResult<(Vec<Damage>, DetectionStatistics)> {
        let mut stream = self.frames.open(video.path()).await?;
        let mut collector = StatsCollector::new();
        let mut damages = Vec::new();

        loop {
            let next = stream
                .next_frame()
                .await
                .map_err(|e| ProcessError::detection(collector.frames_processed(), e.to_string()))?;

            let Some((frame_index, frame)) = next else {
                break;
            };

            let detections = self
                .detector
                .infer(&frame, confidence_threshold)
                .await
                .map_err(|e| ProcessError::detection(frame_index, e.to_string()))?;

            let timestamp_secs = frame_index as f64 / metadata.fps;
            for raw in detections {
                let bounding_box = BoundingBox::new(raw.x, raw.y, raw.width, raw.height)?;
                let severity = self
                    .classifier
                    .classify(bounding_box.area(), raw.confidence);
                let damage = Damage::new(
                    DamageType::from_class_id(raw.class_id),
                    severity,
                    raw.confidence,
                    bounding_box,
                    frame_index,
                    timestamp_secs,
                )?;
                collector.record_damage(&damage);
                damages.push(damage);
            }

            collector.record_frame();
            if collector.frames_processed() % 100 == 0 {
                debug!(
                    video_id = %video.id,
                    frames = collector.frames_processed(),
                    damages = collector.damage_count(),
                    "detection progress"
                );
            }
        }

        Ok((damages, collector.finalize(started.elapsed())))
    }

    /// Best-effort `Failed` write. Never masks the original error.
    async fn fail_video(&self, video: &mut Video, err: &ProcessError) {
        counter!("carscan_videos_processed_total", "outcome" => "failed").increment(1);

        if let Err(transition) = video.mark_failed(err.to_string()) {
            warn!(video_id = %video.id, "skipping failed-status write: {transition}");
            return;
        }
        if let Err(write) = self.videos.update(video).await {
            warn!(video_id = %video.id, "failed-status write did not persist: {write}");
        }
    }
}

/// Group damages by frame for the renderer.
fn group_by_frame(damages: &[Damage]) -> BTreeMap<u64, Vec<Damage>> {
    let mut grouped: BTreeMap<u64, Vec<Damage>> = BTreeMap::new();
    for damage in damages {
        grouped
            .entry(damage.frame_number)
            .or_default()
            .push(damage.clone());
    }
    grouped
}
