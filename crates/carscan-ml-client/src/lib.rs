//! Detection capability boundary.
//!
//! The inference model itself runs out of process (a Python YOLO service);
//! this crate provides the [`DamageDetector`] seam the pipeline consumes and
//! an HTTP client implementation of it.

pub mod client;
pub mod error;
pub mod types;

pub use client::{HttpDamageDetector, MlClientConfig};
pub use error::{MlError, MlResult};
pub use types::{ModelInfo, RawDetection};

use async_trait::async_trait;
use carscan_models::RawFrame;

/// Per-frame damage inference capability.
#[async_trait]
pub trait DamageDetector: Send + Sync {
    /// Whether the model is loaded and ready to serve inference.
    async fn ready(&self) -> bool;

    /// Load the model. Idempotent; a no-op when already ready.
    async fn prepare(&self) -> MlResult<()>;

    /// Run inference on one frame, returning detections at or above
    /// `min_confidence`.
    async fn infer(&self, frame: &RawFrame, min_confidence: f64) -> MlResult<Vec<RawDetection>>;

    /// Version tag of the model behind this capability.
    fn model_version(&self) -> &str;
}
