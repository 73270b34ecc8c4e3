//! Typed repositories for videos and detection results.

use async_trait::async_trait;
use metrics::counter;
use std::path::Path;
use tracing::info;

use carscan_models::{DetectionResult, ResultId, Video, VideoId, VideoStatus};

use crate::error::StorageResult;
use crate::json::JsonCollection;

/// Persistence seam for video records.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Insert (or overwrite) a video record.
    async fn save(&self, video: &Video) -> StorageResult<()>;

    /// Overwrite an existing record; fails `NotFound` when absent.
    async fn update(&self, video: &Video) -> StorageResult<()>;

    async fn find_by_id(&self, id: &VideoId) -> StorageResult<Option<Video>>;

    /// All records for a source path (repeated runs create distinct ids).
    async fn find_by_path(&self, path: &Path) -> StorageResult<Vec<Video>>;

    async fn find_by_status(&self, status: VideoStatus) -> StorageResult<Vec<Video>>;

    async fn list(&self) -> StorageResult<Vec<Video>>;
}

/// Persistence seam for detection results.
#[async_trait]
pub trait DetectionStore: Send + Sync {
    /// Persist a result. Called exactly once per successful run.
    async fn save(&self, result: &DetectionResult) -> StorageResult<()>;

    async fn find_by_id(&self, id: &ResultId) -> StorageResult<Option<DetectionResult>>;

    async fn find_by_video(&self, video_id: &VideoId) -> StorageResult<Option<DetectionResult>>;

    async fn list(&self) -> StorageResult<Vec<DetectionResult>>;
}

/// JSON-file repository for video records (`videos.json`).
pub struct JsonVideoRepository {
    collection: JsonCollection<Video>,
}

impl JsonVideoRepository {
    /// Open the repository inside `dir`, bootstrapping the file if needed.
    pub async fn open(dir: &Path) -> StorageResult<Self> {
        let collection = JsonCollection::open(dir.join("videos.json")).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl VideoStore for JsonVideoRepository {
    async fn save(&self, video: &Video) -> StorageResult<()> {
        self.collection.put(video.id.as_str(), video).await?;
        counter!("carscan_store_writes_total", "entity" => "video").increment(1);
        info!(video_id = %video.id, status = %video.status, "video record saved");
        Ok(())
    }

    async fn update(&self, video: &Video) -> StorageResult<()> {
        self.collection.replace(video.id.as_str(), video).await?;
        counter!("carscan_store_writes_total", "entity" => "video").increment(1);
        Ok(())
    }

    async fn find_by_id(&self, id: &VideoId) -> StorageResult<Option<Video>> {
        self.collection.get(id.as_str()).await
    }

    async fn find_by_path(&self, path: &Path) -> StorageResult<Vec<Video>> {
        let all = self.collection.all().await?;
        Ok(all.into_iter().filter(|v| v.file_path == path).collect())
    }

    async fn find_by_status(&self, status: VideoStatus) -> StorageResult<Vec<Video>> {
        let all = self.collection.all().await?;
        Ok(all.into_iter().filter(|v| v.status == status).collect())
    }

    async fn list(&self) -> StorageResult<Vec<Video>> {
        self.collection.all().await
    }
}

/// JSON-file repository for detection results (`detection_results.json`).
pub struct JsonDetectionRepository {
    collection: JsonCollection<DetectionResult>,
}

impl JsonDetectionRepository {
    /// Open the repository inside `dir`, bootstrapping the file if needed.
    pub async fn open(dir: &Path) -> StorageResult<Self> {
        let collection = JsonCollection::open(dir.join("detection_results.json")).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl DetectionStore for JsonDetectionRepository {
    async fn save(&self, result: &DetectionResult) -> StorageResult<()> {
        self.collection.put(result.id.as_str(), result).await?;
        counter!("carscan_store_writes_total", "entity" => "detection_result").increment(1);
        info!(
            result_id = %result.id,
            video_id = %result.video_id,
            damages = result.damage_count(),
            "detection result saved"
        );
        Ok(())
    }

    async fn find_by_id(&self, id: &ResultId) -> StorageResult<Option<DetectionResult>> {
        self.collection.get(id.as_str()).await
    }

    async fn find_by_video(&self, video_id: &VideoId) -> StorageResult<Option<DetectionResult>> {
        let all = self.collection.all().await?;
        Ok(all.into_iter().find(|r| &r.video_id == video_id))
    }

    async fn list(&self) -> StorageResult<Vec<DetectionResult>> {
        self.collection.all().await
    }
}
