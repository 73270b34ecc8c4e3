//! Shared data models for the CarScan damage detection pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Videos and their processing lifecycle
//! - Detected damages (bounding boxes, types, severities)
//! - Detection results and aggregated statistics
//! - Raw decoded frames exchanged between the frame source and the detector

pub mod damage;
pub mod detection;
pub mod error;
pub mod frame;
pub mod video;

// Re-export common types
pub use damage::{BoundingBox, Damage, DamageId, DamageSeverity, DamageType};
pub use detection::{DetectionResult, DetectionStatistics, ResultId};
pub use error::ModelError;
pub use frame::RawFrame;
pub use video::{Video, VideoId, VideoMetadata, VideoStatus};
