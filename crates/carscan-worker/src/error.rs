//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

use carscan_media::MediaError;
use carscan_models::ModelError;
use carscan_storage::StorageError;

pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors surfaced by the pipeline and the admission gate.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("video not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("video too large: {size_bytes} bytes (limit {limit_bytes})")]
    TooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("invalid video: {0}")]
    InvalidVideo(String),

    #[error("video already being processed: {0}")]
    AlreadyProcessing(PathBuf),

    #[error("batch rejected: {0}")]
    BatchRejected(String),

    #[error("detection model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("detection failed at frame {frame}: {message}")]
    Detection { frame: u64, message: String },

    #[error("model invariant violated: {0}")]
    Model(#[from] ModelError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("media error: {0}")]
    Media(MediaError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcessError {
    pub fn detection(frame: u64, message: impl Into<String>) -> Self {
        Self::Detection {
            frame,
            message: message.into(),
        }
    }

    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable(message.into())
    }

    pub fn batch_rejected(message: impl Into<String>) -> Self {
        Self::BatchRejected(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error was rejected before any state was created.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProcessError::NotFound(_)
                | ProcessError::UnsupportedFormat(_)
                | ProcessError::TooLarge { .. }
                | ProcessError::InvalidVideo(_)
        )
    }
}

impl From<MediaError> for ProcessError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::FileNotFound(path) => ProcessError::NotFound(path),
            MediaError::UnsupportedFormat(ext) => ProcessError::UnsupportedFormat(ext),
            MediaError::TooLarge {
                size_bytes,
                limit_bytes,
            } => ProcessError::TooLarge {
                size_bytes,
                limit_bytes,
            },
            MediaError::InvalidVideo(msg) => ProcessError::InvalidVideo(msg),
            MediaError::ProbeFailed { message, .. } => {
                ProcessError::InvalidVideo(format!("probe failed: {message}"))
            }
            other => ProcessError::Media(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_error_mapping() {
        let err: ProcessError = MediaError::FileNotFound(PathBuf::from("/x.mp4")).into();
        assert!(matches!(err, ProcessError::NotFound(_)));
        assert!(err.is_validation());

        let err: ProcessError = MediaError::UnsupportedFormat("txt".into()).into();
        assert!(matches!(err, ProcessError::UnsupportedFormat(_)));

        let err: ProcessError = MediaError::decode_failed("pipe broke").into();
        assert!(matches!(err, ProcessError::Media(_)));
        assert!(!err.is_validation());
    }
}
