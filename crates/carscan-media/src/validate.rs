//! Source-file validation: existence, format, size cap.

use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// File extensions accepted by the pipeline.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

/// Check whether a path carries a supported video extension.
pub fn is_supported_format(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Validate a source file before any state is created for it.
///
/// Checks existence, extension and the size cap; returns the file size on
/// success. Runs no subprocess, so it is cheap enough for batch prechecks.
pub async fn validate_source(path: &Path, max_size_bytes: u64) -> MediaResult<u64> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;

    if !meta.is_file() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    if !is_supported_format(path) {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("<none>")
            .to_string();
        return Err(MediaError::UnsupportedFormat(ext));
    }

    let size_bytes = meta.len();
    if size_bytes > max_size_bytes {
        return Err(MediaError::TooLarge {
            size_bytes,
            limit_bytes: max_size_bytes,
        });
    }

    Ok(size_bytes)
}
