//! Admission control and bounded fan-out.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use carscan_media::is_supported_format;
use carscan_models::{DetectionResult, VideoId, VideoStatus};
use carscan_storage::VideoStore;

use crate::config::WorkerConfig;
use crate::error::{ProcessError, ProcessResult};
use crate::pipeline::VideoPipeline;

/// Point-in-time view of the gate, for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct GateSnapshot {
    /// Maximum concurrent runs
    pub capacity: usize,
    /// Paths currently admitted (running or waiting for a slot)
    pub admitted: Vec<String>,
    /// Free capacity slots
    pub available_slots: usize,
}

/// Admission control in front of [`VideoPipeline`].
///
/// Guarantees at most one in-flight run per normalized source path and
/// bounds total parallelism with a semaphore; excess submissions wait for
/// a slot instead of being rejected. The admission set lives only in
/// memory: state orphaned by a crash is repaired by
/// [`ProcessingGate::reconcile_orphans`], which callers invoke at startup.
#[derive(Clone)]
pub struct ProcessingGate {
    pipeline: Arc<VideoPipeline>,
    videos: Arc<dyn VideoStore>,
    admitted: Arc<Mutex<HashSet<String>>>,
    permits: Arc<Semaphore>,
    capacity: usize,
    confidence_threshold: f64,
    annotate: bool,
}

impl ProcessingGate {
    /// Create a gate over a pipeline, taking capacity and run defaults from
    /// the worker config.
    pub fn new(
        pipeline: Arc<VideoPipeline>,
        videos: Arc<dyn VideoStore>,
        config: &WorkerConfig,
    ) -> Self {
        let capacity = config.max_concurrent_videos.max(1);
        Self {
            pipeline,
            videos,
            admitted: Arc::new(Mutex::new(HashSet::new())),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            confidence_threshold: config.confidence_threshold,
            annotate: config.annotate,
        }
    }

    /// Canonical admission key for a path. Distinct spellings of the same
    /// file must collide here.
    fn normalize(path: &Path) -> String {
        path.canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .into_owned()
    }

    /// Process one video with the configured defaults.
    ///
    /// Fails `AlreadyProcessing` when the path is currently admitted. The
    /// admission entry is released on every exit path, including
    /// cancellation of the calling task.
    pub async fn submit(&self, path: &Path) -> ProcessResult<DetectionResult> {
        self.submit_with(path, self.confidence_threshold, self.annotate)
            .await
    }

    /// Process one video with explicit run parameters.
    pub async fn submit_with(
        &self,
        path: &Path,
        confidence_threshold: f64,
        annotate: bool,
    ) -> ProcessResult<DetectionResult> {
        let key = Self::normalize(path);
        let _guard = AdmissionGuard::try_admit(&self.admitted, key)
            .ok_or_else(|| ProcessError::AlreadyProcessing(path.to_path_buf()))?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProcessError::internal("admission semaphore closed"))?;

        self.pipeline
            .execute(path, confidence_threshold, annotate)
            .await
    }

    /// Process a batch of videos concurrently.
    ///
    /// Every path is prechecked before any is admitted; one bad path
    /// rejects the whole batch with no record created. Otherwise each item
    /// runs independently (one failure never aborts siblings) and outcomes
    /// are returned aligned to input order.
    pub async fn submit_batch(
        &self,
        paths: &[PathBuf],
    ) -> ProcessResult<Vec<ProcessResult<DetectionResult>>> {
        for path in paths {
            let meta = tokio::fs::metadata(path).await;
            if !meta.map(|m| m.is_file()).unwrap_or(false) {
                return Err(ProcessError::batch_rejected(format!(
                    "{}: file not found",
                    path.display()
                )));
            }
            if !is_supported_format(path) {
                return Err(ProcessError::batch_rejected(format!(
                    "{}: unsupported format",
                    path.display()
                )));
            }
        }

        info!(count = paths.len(), "batch prechecks passed, dispatching");

        let tasks: Vec<_> = paths
            .iter()
            .map(|path| {
                let gate = self.clone();
                let path = path.clone();
                tokio::spawn(async move { gate.submit(&path).await })
            })
            .collect();

        let outcomes = join_all(tasks).await;
        Ok(outcomes
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(ProcessError::internal(format!("processing task died: {e}")))
                })
            })
            .collect())
    }

    /// Advisory cancellation: marks a still-`Processing` video `Cancelled`
    /// without preempting an in-flight frame loop. Returns whether a record
    /// was updated.
    pub async fn cancel(&self, id: &VideoId) -> ProcessResult<bool> {
        match self.videos.find_by_id(id).await? {
            Some(mut video) if video.status == VideoStatus::Processing => {
                video.mark_cancelled()?;
                self.videos.update(&video).await?;
                info!(video_id = %id, "processing cancelled (advisory)");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Repair records left `Processing` by abnormal termination.
    ///
    /// Any persisted `Processing` video whose path has no live admission
    /// entry is transitioned to `Failed`. Returns the repaired count.
    pub async fn reconcile_orphans(&self) -> ProcessResult<usize> {
        let stuck = self.videos.find_by_status(VideoStatus::Processing).await?;
        let mut repaired = 0usize;

        for mut video in stuck {
            if self.is_processing(&video.file_path) {
                continue;
            }
            video.mark_failed("orphaned by abnormal termination")?;
            self.videos.update(&video).await?;
            repaired += 1;
            info!(
                video_id = %video.id,
                path = %video.file_path.display(),
                "orphaned video marked failed"
            );
        }

        if repaired > 0 {
            warn!(repaired, "reconciled orphaned video records");
        }
        Ok(repaired)
    }

    /// Whether a path is currently admitted.
    pub fn is_processing(&self, path: &Path) -> bool {
        let key = Self::normalize(path);
        self.admitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }

    /// Status of a video by id.
    pub async fn status(&self, id: &VideoId) -> ProcessResult<Option<VideoStatus>> {
        Ok(self.videos.find_by_id(id).await?.map(|v| v.status))
    }

    /// Current admission state.
    pub fn snapshot(&self) -> GateSnapshot {
        let mut admitted: Vec<String> = self
            .admitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        admitted.sort();

        GateSnapshot {
            capacity: self.capacity,
            admitted,
            available_slots: self.permits.available_permits(),
        }
    }
}

/// RAII admission entry: inserted on admit, removed on drop, so release
/// happens on success, error and cancellation alike.
struct AdmissionGuard {
    admitted: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl AdmissionGuard {
    fn try_admit(admitted: &Arc<Mutex<HashSet<String>>>, key: String) -> Option<Self> {
        let inserted = admitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        inserted.then(|| Self {
            admitted: Arc::clone(admitted),
            key,
        })
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.admitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
