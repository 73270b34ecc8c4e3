//! Media boundary for the CarScan pipeline.
//!
//! This crate provides:
//! - Source-file validation (existence, format, size cap)
//! - FFprobe metadata extraction
//! - Ordered single-pass frame streaming (FFmpeg rawvideo pipe)
//! - Annotated-artifact rendering (FFmpeg drawbox filters)
//!
//! Decoding and encoding themselves are delegated to FFmpeg subprocesses;
//! everything here is the plumbing around them.

pub mod annotate;
pub mod error;
pub mod frames;
pub mod probe;
pub mod validate;

pub use annotate::{DrawboxRenderer, VideoRenderer};
pub use error::{MediaError, MediaResult};
pub use frames::{FfmpegFrameSource, FrameSource, FrameStream};
pub use probe::probe_video;
pub use validate::{is_supported_format, validate_source, SUPPORTED_EXTENSIONS};
