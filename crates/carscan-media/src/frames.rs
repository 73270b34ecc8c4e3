//! Ordered single-pass frame streaming.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use carscan_models::{RawFrame, VideoMetadata};

use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Producer of ordered frame streams for a video file.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Probe the source for its technical metadata.
    async fn probe(&self, path: &Path) -> MediaResult<VideoMetadata>;

    /// Open a finite, ordered, single-pass stream of decoded frames.
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameStream>>;
}

/// One opened stream. Frames arrive strictly in order; the stream is
/// exhausted after the first `None`. Resources are released on drop.
#[async_trait]
pub trait FrameStream: Send {
    /// Next `(frame_index, frame)` pair, or `None` when the source is done.
    async fn next_frame(&mut self) -> MediaResult<Option<(u64, RawFrame)>>;
}

/// Frame source backed by an FFmpeg rawvideo pipe.
///
/// FFmpeg decodes the file and writes packed RGB24 frames to stdout; the
/// stream slices that byte stream into fixed-size frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegFrameSource;

impl FfmpegFrameSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn probe(&self, path: &Path) -> MediaResult<VideoMetadata> {
        probe_video(path).await
    }

    async fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameStream>> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let meta = probe_video(path).await?;
        let frame_len = RawFrame::expected_len(meta.width, meta.height);

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::decode_failed("ffmpeg stdout not captured"))?;

        debug!(path = %path.display(), frame_len, "opened ffmpeg frame stream");

        Ok(Box::new(FfmpegFrameStream {
            child,
            stdout,
            width: meta.width,
            height: meta.height,
            frame_len,
            next_index: 0,
            done: false,
        }))
    }
}

struct FfmpegFrameStream {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    frame_len: usize,
    next_index: u64,
    done: bool,
}

#[async_trait]
impl FrameStream for FfmpegFrameStream {
    async fn next_frame(&mut self) -> MediaResult<Option<(u64, RawFrame)>> {
        if self.done {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0usize;

        while filled < self.frame_len {
            let n = self.stdout.read(&mut buf[filled..]).await?;
            if n == 0 {
                self.done = true;
                if filled == 0 {
                    // Stream ended on a frame boundary; confirm the decoder
                    // actually succeeded
                    let status = self.child.wait().await?;
                    if !status.success() {
                        return Err(MediaError::decode_failed(format!(
                            "ffmpeg exited with {status}"
                        )));
                    }
                    return Ok(None);
                }
                return Err(MediaError::decode_failed(format!(
                    "truncated frame {} ({filled}/{} bytes)",
                    self.next_index, self.frame_len
                )));
            }
            filled += n;
        }

        let index = self.next_index;
        self.next_index += 1;
        Ok(Some((index, RawFrame::rgb24(self.width, self.height, buf))))
    }
}
