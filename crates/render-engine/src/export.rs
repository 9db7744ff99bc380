//! Merge jobs and the ffmpeg-backed entry point.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use flowboard_board_model::edge::ClipReference;
use flowboard_common::cancel::CancelFlag;
use flowboard_common::config::CompositorConfig;
use flowboard_common::error::{FlowboardError, FlowboardResult};

use crate::compositor::{MergeProgressCallback, MergedVideo, SequentialCompositor};
use crate::recorder::FfmpegRecorder;
use crate::source::FfmpegClipLoader;

/// A client-side merge ready to run.
#[derive(Debug, Clone)]
pub struct MergeJob {
    /// Clips in playback order.
    pub clips: Vec<ClipReference>,

    /// Output file path.
    pub output_path: PathBuf,

    /// Frame rate, container, and letterbox colour.
    pub config: CompositorConfig,
}

/// Default output file name for a merge, e.g. `merged-video-1767225600000.webm`.
pub fn default_output_name(config: &CompositorConfig, timestamp_ms: i64) -> String {
    format!("merged-video-{timestamp_ms}.{}", config.format.extension())
}

/// Merge the job's clips into its output file with ffmpeg.
///
/// This is the main entry point for client-side merging.
pub async fn merge_clips(
    job: MergeJob,
    cancel: CancelFlag,
    progress: Option<MergeProgressCallback>,
) -> FlowboardResult<MergedVideo> {
    tracing::info!(
        output = %job.output_path.display(),
        format = ?job.config.format,
        clips = job.clips.len(),
        "Starting merge job"
    );

    if job.clips.len() < 2 {
        return Err(FlowboardError::validation(format!(
            "At least 2 videos are required for merging, got {}",
            job.clips.len()
        )));
    }
    let background = job.config.background_rgba()?;

    let tools = ToolStatus::detect().await;
    if !tools.ffmpeg || !tools.ffprobe {
        return Err(FlowboardError::unsupported(
            "Client-side merging needs ffmpeg and ffprobe in PATH",
        ));
    }

    let loader = Arc::new(FfmpegClipLoader::new(job.config.fps));
    let compositor = SequentialCompositor::new(loader, job.config.fps)
        .with_background(background)
        .with_cancel_flag(cancel);
    let mut recorder = FfmpegRecorder::new(job.output_path, job.config.format);

    compositor
        .merge(&job.clips, &mut recorder, progress.as_ref())
        .await
}

/// Availability of the external media tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    pub ffmpeg: bool,
    pub ffprobe: bool,
}

impl ToolStatus {
    pub async fn detect() -> Self {
        Self {
            ffmpeg: command_exists("ffmpeg").await,
            ffprobe: command_exists("ffprobe").await,
        }
    }

    pub fn all_present(&self) -> bool {
        self.ffmpeg && self.ffprobe
    }
}

async fn command_exists(binary: &str) -> bool {
    tokio::process::Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowboard_common::config::OutputFormat;

    #[test]
    fn output_name_uses_container_extension() {
        let mut config = CompositorConfig::default();
        assert_eq!(default_output_name(&config, 42), "merged-video-42.webm");
        config.format = OutputFormat::Mp4;
        assert_eq!(default_output_name(&config, 42), "merged-video-42.mp4");
    }

    #[tokio::test]
    async fn one_clip_fails_validation_before_tool_checks() {
        let job = MergeJob {
            clips: vec![ClipReference::new("a.mp4")],
            output_path: PathBuf::from("/tmp/flowboard-never-written.webm"),
            config: CompositorConfig::default(),
        };
        let err = merge_clips(job, CancelFlag::new(), None).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        assert!(!command_exists("flowboard-definitely-not-a-binary").await);
    }
}
