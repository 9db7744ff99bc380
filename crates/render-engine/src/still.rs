//! Still images of a clip's final moment.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use flowboard_board_model::diagram::StillExtractor;
use flowboard_board_model::edge::ClipReference;
use flowboard_board_model::ids::FrameId;
use flowboard_common::error::{FlowboardError, FlowboardResult};
use tokio::process::Command;

use crate::source::probe_clip;

/// How far before the end of the clip the still is taken.
pub const STILL_OFFSET_SECS: f64 = 0.1;

/// Writes a PNG of the last moment of each clip into a directory.
#[derive(Debug, Clone)]
pub struct FfmpegStillExtractor {
    output_dir: PathBuf,
}

impl FfmpegStillExtractor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File the still for `frame` is written to.
    pub fn still_path(&self, frame: &FrameId) -> PathBuf {
        let name: String = frame
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.output_dir.join(format!("{name}.png"))
    }
}

/// Seek position for the still of a clip lasting `duration_secs`.
pub fn still_timestamp(duration_secs: f64) -> f64 {
    (duration_secs - STILL_OFFSET_SECS).max(0.0)
}

#[async_trait]
impl StillExtractor for FfmpegStillExtractor {
    async fn extract_last_frame(
        &self,
        clip: &ClipReference,
        frame: &FrameId,
    ) -> FlowboardResult<PathBuf> {
        let duration = match clip.duration_secs.filter(|d| *d > 0.0) {
            Some(d) => d,
            None => probe_clip(&clip.url).await?.duration_secs,
        };
        let out = self.still_path(frame);
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-y", "-ss"])
            .arg(format!("{:.3}", still_timestamp(duration)))
            .arg("-i")
            .arg(&clip.url)
            .args(["-frames:v", "1"])
            .arg(&out)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| FlowboardError::media(&clip.url, format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() || !out.exists() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FlowboardError::media(
                &clip.url,
                format!("still extraction failed: {}", stderr.trim()),
            ));
        }

        let (width, height) = image::image_dimensions(&out).map_err(|e| {
            FlowboardError::media(&clip.url, format!("extracted still is unreadable: {e}"))
        })?;
        tracing::debug!(
            frame = %frame,
            still = %out.display(),
            width,
            height,
            "Extracted last frame"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_is_taken_just_before_the_end() {
        assert!((still_timestamp(5.0) - 4.9).abs() < 1e-9);
        assert_eq!(still_timestamp(0.05), 0.0);
    }

    #[test]
    fn still_path_is_filesystem_safe() {
        let extractor = FfmpegStillExtractor::new("/tmp/stills");
        assert_eq!(
            extractor.still_path(&FrameId::new("frame:ab/12")),
            PathBuf::from("/tmp/stills/frame_ab_12.png")
        );
    }
}
