//! Worker configuration.

use std::path::{Path, PathBuf};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum videos processed concurrently
    pub max_concurrent_videos: usize,
    /// Default confidence threshold for detection runs
    pub confidence_threshold: f64,
    /// Maximum accepted source file size in megabytes
    pub max_video_size_mb: u64,
    /// Whether successful runs with damages render an annotated artifact
    pub annotate: bool,
    /// Directory holding the JSON stores
    pub storage_dir: PathBuf,
    /// Directory for annotated artifacts
    pub output_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_videos: 2,
            confidence_threshold: 0.5,
            max_video_size_mb: 500,
            annotate: true,
            storage_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_videos: std::env::var("CARSCAN_MAX_CONCURRENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            confidence_threshold: std::env::var("CARSCAN_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.5),
            max_video_size_mb: std::env::var("CARSCAN_MAX_VIDEO_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
            annotate: std::env::var("CARSCAN_CREATE_ANNOTATED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            storage_dir: std::env::var("CARSCAN_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            output_dir: std::env::var("CARSCAN_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
        }
    }

    /// Size cap in bytes.
    pub fn max_video_size_bytes(&self) -> u64 {
        self.max_video_size_mb * 1024 * 1024
    }

    /// Artifact path for an annotated copy of `source`
    /// (`<output_dir>/annotated_<file name>`).
    pub fn annotated_output_path(&self, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        self.output_dir.join(format!("annotated_{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_videos, 2);
        assert_eq!(config.max_video_size_bytes(), 500 * 1024 * 1024);
        assert!(config.annotate);
    }

    #[test]
    fn test_annotated_output_path() {
        let config = WorkerConfig::default();
        let path = config.annotated_output_path(Path::new("/videos/front.mp4"));
        assert_eq!(path, PathBuf::from("output/annotated_front.mp4"));
    }
}
