//! Video records and their processing lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::damage::Damage;
use crate::error::ModelError;

/// Unique identifier for a video processing run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Video processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Accepted but not yet picked up by the pipeline
    #[default]
    Pending,
    /// Frame loop in progress
    Processing,
    /// Processing finished successfully
    Completed,
    /// Processing failed
    Failed,
    /// Processing was cancelled
    Cancelled,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
            VideoStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VideoStatus::Completed | VideoStatus::Failed | VideoStatus::Cancelled
        )
    }

    /// Check whether a transition to `next` is legal.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        match self {
            VideoStatus::Pending => matches!(
                next,
                VideoStatus::Processing | VideoStatus::Failed | VideoStatus::Cancelled
            ),
            VideoStatus::Processing => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Technical metadata extracted from the source file during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    /// Duration in seconds
    pub duration_secs: f64,
    /// Frame rate
    pub fps: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Total number of frames
    pub frame_count: u64,
    /// Video codec name
    pub codec: String,
    /// Bitrate in bits per second
    pub bitrate: u64,
    /// File size in bytes
    pub size_bytes: u64,
}

impl VideoMetadata {
    /// Resolution as a `WxH` string.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// A video admitted to the damage detection pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    /// Unique video ID
    pub id: VideoId,

    /// Source file path; immutable after creation
    pub file_path: PathBuf,

    /// Display name (file name)
    pub name: String,

    /// Processing status
    #[serde(default)]
    pub status: VideoStatus,

    /// Technical metadata from probing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,

    /// Damages detected in this video; populated only once completed.
    /// The owning copy lives on the `DetectionResult`.
    #[serde(default)]
    pub damages: Vec<Damage>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Timestamp of reaching a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,

    /// Wall-clock processing time in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_secs: Option<f64>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Video {
    /// Create a new video record in `Processing` state.
    pub fn new(file_path: impl Into<PathBuf>, metadata: Option<VideoMetadata>) -> Self {
        let file_path = file_path.into();
        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string_lossy().into_owned());
        let now = Utc::now();

        Self {
            id: VideoId::new(),
            file_path,
            name,
            status: VideoStatus::Processing,
            metadata,
            damages: Vec::new(),
            created_at: now,
            updated_at: now,
            processed_at: None,
            processing_time_secs: None,
            error_message: None,
        }
    }

    /// Source path as a borrowed `Path`.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn is_processed(&self) -> bool {
        self.status == VideoStatus::Completed
    }

    pub fn has_damages(&self) -> bool {
        !self.damages.is_empty()
    }

    pub fn damage_count(&self) -> usize {
        self.damages.len()
    }

    fn transition(&mut self, next: VideoStatus) -> Result<(), ModelError> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark as completed, mirroring the detected damages onto the record.
    pub fn mark_completed(
        &mut self,
        damages: Vec<Damage>,
        processing_time_secs: f64,
    ) -> Result<(), ModelError> {
        self.transition(VideoStatus::Completed)?;
        self.damages = damages;
        self.processed_at = Some(Utc::now());
        self.processing_time_secs = Some(processing_time_secs);
        self.error_message = None;
        Ok(())
    }

    /// Mark as failed with the captured error message.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), ModelError> {
        self.transition(VideoStatus::Failed)?;
        self.processed_at = Some(Utc::now());
        self.error_message = Some(error.into());
        Ok(())
    }

    /// Mark as cancelled (advisory; does not preempt a running frame loop).
    pub fn mark_cancelled(&mut self) -> Result<(), ModelError> {
        self.transition(VideoStatus::Cancelled)?;
        self.processed_at = Some(Utc::now());
        Ok(())
    }
}
