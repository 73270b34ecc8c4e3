//! JSON-file persistence for CarScan.
//!
//! Each entity family lives in one JSON document map keyed by id
//! (`videos.json`, `detection_results.json`). Writes go through a
//! write-temp-then-rename cycle so a crash never leaves a half-written
//! store behind. Enum fields serialize as their stable snake_case tokens,
//! so records round-trip byte-stable across restarts.

pub mod error;
pub mod json;
pub mod repos;

pub use error::{StorageError, StorageResult};
pub use repos::{DetectionStore, JsonDetectionRepository, JsonVideoRepository, VideoStore};
