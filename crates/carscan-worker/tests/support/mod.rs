//! Scripted fakes for the pipeline's external seams.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use carscan_media::{FrameSource, FrameStream, MediaError, MediaResult, VideoRenderer};
use carscan_ml_client::{DamageDetector, MlError, MlResult, RawDetection};
use carscan_models::{
    Damage, DetectionResult, RawFrame, ResultId, Video, VideoId, VideoMetadata, VideoStatus,
};
use carscan_storage::{DetectionStore, StorageError, StorageResult, VideoStore};
use carscan_worker::{ProcessingGate, ThresholdClassifier, VideoPipeline, WorkerConfig};

pub fn test_metadata(frame_count: u64) -> VideoMetadata {
    VideoMetadata {
        duration_secs: frame_count as f64 / 30.0,
        fps: 30.0,
        width: 4,
        height: 4,
        frame_count,
        codec: "h264".to_string(),
        bitrate: 1_000_000,
        size_bytes: 1024,
    }
}

/// Frame source producing `frame_count` synthetic frames in order.
pub struct ScriptedFrameSource {
    pub metadata: VideoMetadata,
    /// Delay before each frame, to keep a run in flight
    pub frame_delay: Option<Duration>,
    /// Fail `probe` for paths whose file name contains this marker
    pub fail_probe_marker: Option<String>,
}

impl ScriptedFrameSource {
    pub fn new(frame_count: u64) -> Self {
        Self {
            metadata: test_metadata(frame_count),
            frame_delay: None,
            fail_probe_marker: None,
        }
    }

    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    pub fn with_probe_failure_for(mut self, marker: impl Into<String>) -> Self {
        self.fail_probe_marker = Some(marker.into());
        self
    }

    fn probe_fails(&self, path: &Path) -> bool {
        match &self.fail_probe_marker {
            Some(marker) => path
                .file_name()
                .map(|n| n.to_string_lossy().contains(marker))
                .unwrap_or(false),
            None => false,
        }
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn probe(&self, path: &Path) -> MediaResult<VideoMetadata> {
        if self.probe_fails(path) {
            return Err(MediaError::invalid_video("scripted probe failure"));
        }
        Ok(self.metadata.clone())
    }

    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameStream>> {
        if self.probe_fails(path) {
            return Err(MediaError::invalid_video("scripted probe failure"));
        }
        Ok(Box::new(ScriptedStream {
            next: 0,
            total: self.metadata.frame_count,
            width: self.metadata.width,
            height: self.metadata.height,
            delay: self.frame_delay,
        }))
    }
}

struct ScriptedStream {
    next: u64,
    total: u64,
    width: u32,
    height: u32,
    delay: Option<Duration>,
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn next_frame(&mut self) -> MediaResult<Option<(u64, RawFrame)>> {
        if self.next >= self.total {
            return Ok(None);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let index = self.next;
        self.next += 1;
        let data = vec![0u8; RawFrame::expected_len(self.width, self.height)];
        Ok(Some((index, RawFrame::rgb24(self.width, self.height, data))))
    }
}

/// Detector replaying scripted detections keyed by global call index.
///
/// The call counter spans runs, so a `fail_at` index fires once; tests that
/// submit several videos rely on that to script per-run behavior.
pub struct ScriptedDetector {
    ready: AtomicBool,
    prepare_ok: bool,
    detections: HashMap<u64, Vec<RawDetection>>,
    fail_at: Option<u64>,
    infer_delay: Option<Duration>,
    calls: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            prepare_ok: true,
            detections: HashMap::new(),
            fail_at: None,
            infer_delay: None,
            calls: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn not_ready(mut self, prepare_ok: bool) -> Self {
        self.ready = AtomicBool::new(false);
        self.prepare_ok = prepare_ok;
        self
    }

    pub fn with_detections(mut self, call_index: u64, detections: Vec<RawDetection>) -> Self {
        self.detections.insert(call_index, detections);
        self
    }

    pub fn failing_at(mut self, call_index: u64) -> Self {
        self.fail_at = Some(call_index);
        self
    }

    pub fn with_infer_delay(mut self, delay: Duration) -> Self {
        self.infer_delay = Some(delay);
        self
    }

    pub fn max_concurrent_infers(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DamageDetector for ScriptedDetector {
    async fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn prepare(&self) -> MlResult<()> {
        if self.prepare_ok {
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(MlError::ModelNotReady("scripted load failure".to_string()))
        }
    }

    async fn infer(&self, _frame: &RawFrame, _min_confidence: f64) -> MlResult<Vec<RawDetection>> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);

        let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(concurrent, Ordering::SeqCst);
        if let Some(delay) = self.infer_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_at == Some(index) {
            return Err(MlError::RequestFailed("scripted inference failure".to_string()));
        }
        Ok(self.detections.get(&index).cloned().unwrap_or_default())
    }

    fn model_version(&self) -> &str {
        "scripted-model"
    }
}

pub fn detection(class_id: u32, confidence: f64, width: f64, height: f64) -> RawDetection {
    RawDetection {
        class_id,
        confidence,
        x: 1.0,
        y: 2.0,
        width,
        height,
    }
}

/// In-memory video store.
#[derive(Default)]
pub struct MemoryVideoStore {
    records: Mutex<HashMap<String, Video>>,
    fail_updates: AtomicBool,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `update` fail, to exercise best-effort writes.
    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    /// Seed a record directly (e.g. a crash leftover).
    pub fn seed(&self, video: Video) {
        self.lock().insert(video.id.as_str().to_string(), video);
    }

    pub fn all(&self) -> Vec<Video> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Video>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn save(&self, video: &Video) -> StorageResult<()> {
        self.lock()
            .insert(video.id.as_str().to_string(), video.clone());
        Ok(())
    }

    async fn update(&self, video: &Video) -> StorageResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StorageError::corrupt("scripted update failure"));
        }
        let mut records = self.lock();
        if !records.contains_key(video.id.as_str()) {
            return Err(StorageError::not_found(video.id.as_str()));
        }
        records.insert(video.id.as_str().to_string(), video.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &VideoId) -> StorageResult<Option<Video>> {
        Ok(self.lock().get(id.as_str()).cloned())
    }

    async fn find_by_path(&self, path: &Path) -> StorageResult<Vec<Video>> {
        Ok(self
            .lock()
            .values()
            .filter(|v| v.file_path == path)
            .cloned()
            .collect())
    }

    async fn find_by_status(&self, status: VideoStatus) -> StorageResult<Vec<Video>> {
        Ok(self
            .lock()
            .values()
            .filter(|v| v.status == status)
            .cloned()
            .collect())
    }

    async fn list(&self) -> StorageResult<Vec<Video>> {
        Ok(self.all())
    }
}

/// In-memory detection result store.
#[derive(Default)]
pub struct MemoryDetectionStore {
    records: Mutex<HashMap<String, DetectionResult>>,
}

impl MemoryDetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<DetectionResult> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DetectionResult>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DetectionStore for MemoryDetectionStore {
    async fn save(&self, result: &DetectionResult) -> StorageResult<()> {
        self.lock()
            .insert(result.id.as_str().to_string(), result.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &ResultId) -> StorageResult<Option<DetectionResult>> {
        Ok(self.lock().get(id.as_str()).cloned())
    }

    async fn find_by_video(&self, video_id: &VideoId) -> StorageResult<Option<DetectionResult>> {
        Ok(self
            .lock()
            .values()
            .find(|r| &r.video_id == video_id)
            .cloned())
    }

    async fn list(&self) -> StorageResult<Vec<DetectionResult>> {
        Ok(self.all())
    }
}

/// Renderer that records calls and optionally fails.
#[derive(Default)]
pub struct StubRenderer {
    pub fail: bool,
    calls: AtomicUsize,
}

impl StubRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoRenderer for StubRenderer {
    async fn render_annotated(
        &self,
        _source: &Path,
        _damages_by_frame: &std::collections::BTreeMap<u64, Vec<Damage>>,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MediaError::render_failed("scripted render failure", None));
        }
        Ok(output.to_path_buf())
    }
}

/// Assembled test harness around one pipeline + gate.
pub struct Harness {
    pub gate: ProcessingGate,
    pub pipeline: Arc<VideoPipeline>,
    pub videos: Arc<MemoryVideoStore>,
    pub results: Arc<MemoryDetectionStore>,
    pub detector: Arc<ScriptedDetector>,
    pub renderer: Arc<StubRenderer>,
}

pub fn test_config(max_concurrent: usize) -> WorkerConfig {
    WorkerConfig {
        max_concurrent_videos: max_concurrent,
        confidence_threshold: 0.5,
        max_video_size_mb: 10,
        annotate: false,
        storage_dir: PathBuf::from("data"),
        output_dir: PathBuf::from("output"),
    }
}

pub fn build_harness(
    config: WorkerConfig,
    source: ScriptedFrameSource,
    detector: ScriptedDetector,
    renderer: StubRenderer,
) -> Harness {
    let videos = Arc::new(MemoryVideoStore::new());
    let results = Arc::new(MemoryDetectionStore::new());
    let detector = Arc::new(detector);
    let renderer = Arc::new(renderer);

    let pipeline = Arc::new(VideoPipeline::new(
        config.clone(),
        Arc::new(source),
        detector.clone(),
        renderer.clone(),
        Arc::new(ThresholdClassifier::default()),
        videos.clone(),
        results.clone(),
    ));
    let gate = ProcessingGate::new(pipeline.clone(), videos.clone(), &config);

    Harness {
        gate,
        pipeline,
        videos,
        results,
        detector,
        renderer,
    }
}

/// Create a small fake video file inside `dir`.
pub fn temp_video(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not really mpeg4 but close enough").unwrap();
    path
}
