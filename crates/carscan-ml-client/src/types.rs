//! ML service request/response types.

use serde::{Deserialize, Serialize};

/// One detection as reported by the model, before domain validation.
///
/// Coordinates are pixel-space and unchecked; the pipeline converts them
/// into a validated `BoundingBox`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Model class index
    pub class_id: u32,
    /// Detection confidence
    pub confidence: f64,
    /// X of the top-left corner
    pub x: f64,
    /// Y of the top-left corner
    pub y: f64,
    /// Region width
    pub width: f64,
    /// Region height
    pub height: f64,
}

/// Inference request for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout of the payload
    pub pixel_format: String,
    /// Base64-encoded packed pixel data
    pub data_b64: String,
    /// Minimum confidence for returned detections
    pub min_confidence: f64,
}

/// Inference response for one frame.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceResponse {
    pub detections: Vec<RawDetection>,
}

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
}

/// Loaded-model description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub version: String,
    pub device: String,
    #[serde(default)]
    pub classes: Vec<String>,
}
