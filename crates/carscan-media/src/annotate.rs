//! Annotated-artifact rendering.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

use carscan_models::Damage;

use crate::error::{MediaError, MediaResult};

/// Renderer producing an annotated copy of a processed video.
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    /// Render `source` with the detected damages drawn in, writing the
    /// artifact to `output`. Returns the artifact path.
    async fn render_annotated(
        &self,
        source: &Path,
        damages_by_frame: &BTreeMap<u64, Vec<Damage>>,
        output: &Path,
    ) -> MediaResult<PathBuf>;
}

/// Renderer that burns bounding boxes in with FFmpeg `drawbox` filters,
/// one filter per damage, gated to the damage's frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawboxRenderer;

impl DrawboxRenderer {
    pub fn new() -> Self {
        Self
    }

    fn build_filter(damages_by_frame: &BTreeMap<u64, Vec<Damage>>) -> String {
        let mut filter = String::new();
        for (frame, damages) in damages_by_frame {
            for damage in damages {
                if !filter.is_empty() {
                    filter.push(',');
                }
                let bbox = &damage.bounding_box;
                let _ = write!(
                    filter,
                    "drawbox=enable='eq(n\\,{frame})':x={:.0}:y={:.0}:w={:.0}:h={:.0}:color=red@0.8:t=3",
                    bbox.x, bbox.y, bbox.width, bbox.height
                );
            }
        }
        filter
    }
}

#[async_trait]
impl VideoRenderer for DrawboxRenderer {
    async fn render_annotated(
        &self,
        source: &Path,
        damages_by_frame: &BTreeMap<u64, Vec<Damage>>,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let filter = Self::build_filter(damages_by_frame);
        if filter.is_empty() {
            return Err(MediaError::render_failed("no damages to annotate", None));
        }

        let result = Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-i"])
            .arg(source)
            .args(["-vf", &filter, "-c:a", "copy"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            return Err(MediaError::render_failed(
                format!("ffmpeg exited with {}", result.status),
                Some(String::from_utf8_lossy(&result.stderr).to_string()),
            ));
        }

        info!(output = %output.display(), "annotated artifact rendered");
        Ok(output.to_path_buf())
    }
}
