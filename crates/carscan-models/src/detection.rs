//! Detection results and aggregated statistics.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::damage::{Damage, DamageType};
use crate::error::ModelError;
use crate::video::VideoId;

/// Unique identifier for a detection result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ResultId(pub String);

impl ResultId {
    /// Generate a new random result ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary statistics for one detection run.
///
/// Counts are keyed by the stable string tokens of the type/severity enums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct DetectionStatistics {
    /// Number of frames fed through the detector
    pub frames_processed: u64,
    /// Total damages detected across all frames
    pub total_damages_detected: u64,
    /// Damage counts per type token
    pub damages_by_type: HashMap<String, u64>,
    /// Damage counts per severity token
    pub damages_by_severity: HashMap<String, u64>,
    /// Mean confidence over all damages; 0.0 when none were detected
    pub average_confidence: f64,
    /// Wall-clock processing time in seconds
    pub processing_time_secs: f64,
    /// Frames processed per second of wall-clock time
    pub frames_per_second: f64,
}

impl DetectionStatistics {
    /// Valid snapshot for a run that observed no damages.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Complete outcome of one damage detection run. Persisted exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DetectionResult {
    /// Unique result ID
    pub id: ResultId,

    /// The video this result belongs to
    pub video_id: VideoId,

    /// Source file path of that video
    pub video_path: PathBuf,

    /// All damages detected, in frame order. This is the owning copy.
    pub damages: Vec<Damage>,

    /// Aggregated run statistics
    pub statistics: DetectionStatistics,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Version tag of the model that produced the detections
    pub model_version: String,

    /// Confidence threshold the run was executed with
    pub confidence_threshold: f64,

    /// Path of the annotated artifact, when rendering was requested and
    /// succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_path: Option<PathBuf>,
}

impl DetectionResult {
    /// Assemble a result, enforcing threshold bounds and the
    /// statistics/damages consistency invariant.
    pub fn new(
        video_id: VideoId,
        video_path: impl Into<PathBuf>,
        damages: Vec<Damage>,
        statistics: DetectionStatistics,
        model_version: impl Into<String>,
        confidence_threshold: f64,
    ) -> Result<Self, ModelError> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(ModelError::ThresholdOutOfRange(confidence_threshold));
        }
        let model_version = model_version.into();
        if model_version.is_empty() {
            return Err(ModelError::MissingModelVersion);
        }
        if statistics.total_damages_detected != damages.len() as u64 {
            return Err(ModelError::StatisticsMismatch {
                reported: statistics.total_damages_detected,
                actual: damages.len(),
            });
        }

        Ok(Self {
            id: ResultId::new(),
            video_id,
            video_path: video_path.into(),
            damages,
            statistics,
            created_at: Utc::now(),
            model_version,
            confidence_threshold,
            annotated_path: None,
        })
    }

    pub fn has_damages(&self) -> bool {
        !self.damages.is_empty()
    }

    pub fn damage_count(&self) -> usize {
        self.damages.len()
    }

    /// Damages detected in a specific frame.
    pub fn damages_in_frame(&self, frame_number: u64) -> Vec<&Damage> {
        self.damages
            .iter()
            .filter(|d| d.frame_number == frame_number)
            .collect()
    }

    /// Damages of a specific type.
    pub fn damages_of_type(&self, damage_type: DamageType) -> Vec<&Damage> {
        self.damages
            .iter()
            .filter(|d| d.damage_type == damage_type)
            .collect()
    }

    /// Damages whose confidence meets the run threshold.
    pub fn high_confidence_damages(&self) -> Vec<&Damage> {
        self.damages
            .iter()
            .filter(|d| d.confidence >= self.confidence_threshold)
            .collect()
    }

    /// Mean number of damages per processed frame.
    pub fn damage_density(&self) -> f64 {
        if self.statistics.frames_processed == 0 {
            return 0.0;
        }
        self.damages.len() as f64 / self.statistics.frames_processed as f64
    }
}
