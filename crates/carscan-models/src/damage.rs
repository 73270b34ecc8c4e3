//! Detected damages: bounding boxes, taxonomy, severity.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ModelError;

/// Unique identifier for a detected damage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct DamageId(pub String);

impl DamageId {
    /// Generate a new random damage ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DamageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DamageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pixel-space rectangle around a detected region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// X coordinate of the top-left corner
    pub x: f64,
    /// Y coordinate of the top-left corner
    pub y: f64,
    /// Width in pixels
    pub width: f64,
    /// Height in pixels
    pub height: f64,
}

impl BoundingBox {
    /// Create a bounding box, rejecting negative origins and empty extents.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self, ModelError> {
        if x < 0.0 || y < 0.0 {
            return Err(ModelError::NegativeOrigin { x, y });
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(ModelError::EmptyBox { width, height });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Area in square pixels.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Center point of the box.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Kinds of vehicle damage the model can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Scratch,
    Dent,
    Crack,
    Rust,
    BrokenPart,
    /// Detected region that maps to no known class
    Unknown,
}

impl DamageType {
    /// Map a model class index to a damage type.
    ///
    /// Unrecognized class ids become [`DamageType::Unknown`] rather than
    /// failing the frame.
    pub fn from_class_id(class_id: u32) -> Self {
        match class_id {
            0 => DamageType::Scratch,
            1 => DamageType::Dent,
            2 => DamageType::Crack,
            3 => DamageType::Rust,
            4 => DamageType::BrokenPart,
            _ => DamageType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DamageType::Scratch => "scratch",
            DamageType::Dent => "dent",
            DamageType::Crack => "crack",
            DamageType::Rust => "rust",
            DamageType::BrokenPart => "broken_part",
            DamageType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Four-level ordinal classification of damage importance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DamageSeverity {
    Minor,
    Moderate,
    Severe,
    Critical,
}

impl DamageSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageSeverity::Minor => "minor",
            DamageSeverity::Moderate => "moderate",
            DamageSeverity::Severe => "severe",
            DamageSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for DamageSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single damage detected in one frame. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Damage {
    /// Unique damage ID
    pub id: DamageId,
    /// Damage classification
    pub damage_type: DamageType,
    /// Severity derived from region size and confidence
    pub severity: DamageSeverity,
    /// Model confidence, within [0.0, 1.0]
    pub confidence: f64,
    /// Region of the frame containing the damage
    pub bounding_box: BoundingBox,
    /// Frame ordinal the damage was detected in
    pub frame_number: u64,
    /// Position in the video, in seconds (frame_number / fps)
    pub timestamp_secs: f64,
}

impl Damage {
    /// Create a damage record, enforcing confidence bounds.
    pub fn new(
        damage_type: DamageType,
        severity: DamageSeverity,
        confidence: f64,
        bounding_box: BoundingBox,
        frame_number: u64,
        timestamp_secs: f64,
    ) -> Result<Self, ModelError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ModelError::ConfidenceOutOfRange(confidence));
        }
        Ok(Self {
            id: DamageId::new(),
            damage_type,
            severity,
            confidence,
            bounding_box,
            frame_number,
            timestamp_secs,
        })
    }

    /// Whether the detection confidence meets `threshold`.
    pub fn is_high_confidence(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }

    /// Whether the damage is severe or critical.
    pub fn is_severe(&self) -> bool {
        self.severity >= DamageSeverity::Severe
    }
}
