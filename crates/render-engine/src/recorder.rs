//! Recording the canvas into a video file.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use flowboard_common::config::OutputFormat;
use flowboard_common::error::{FlowboardError, FlowboardResult};
use image::RgbaImage;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};

use crate::process::StderrCapture;

/// Size and rate of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl RecordingSpec {
    pub fn validate(&self) -> FlowboardResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FlowboardError::validation(
                "recording width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(FlowboardError::validation("recording fps must be non-zero"));
        }
        Ok(())
    }
}

/// Captures canvas snapshots at a fixed rate.
#[async_trait]
pub trait FrameRecorder: Send {
    async fn start(&mut self, spec: RecordingSpec) -> FlowboardResult<()>;

    /// Append one output frame.
    async fn push_frame(&mut self, frame: &RgbaImage) -> FlowboardResult<()>;

    /// Stop recording and return the finished file.
    async fn finish(&mut self) -> FlowboardResult<PathBuf>;

    /// Stop recording and discard any partial output.
    async fn abort(&mut self);
}

/// Recorder that pipes raw RGBA frames into an `ffmpeg` encoder.
pub struct FfmpegRecorder {
    out_path: PathBuf,
    format: OutputFormat,
    spec: Option<RecordingSpec>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<StderrCapture>,
}

impl FfmpegRecorder {
    pub fn new(out_path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            out_path: out_path.into(),
            format,
            spec: None,
            child: None,
            stdin: None,
            stderr: None,
        }
    }

    pub fn out_path(&self) -> &Path {
        &self.out_path
    }
}

/// Encoder arguments for the output container.
pub fn codec_args(format: OutputFormat) -> Vec<&'static str> {
    match format {
        OutputFormat::Webm => vec![
            "-c:v",
            "libvpx-vp9",
            "-b:v",
            "0",
            "-crf",
            "32",
            "-deadline",
            "realtime",
            "-pix_fmt",
            "yuv420p",
        ],
        OutputFormat::Mp4 => vec![
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-crf",
            "20",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ],
    }
}

#[async_trait]
impl FrameRecorder for FfmpegRecorder {
    async fn start(&mut self, spec: RecordingSpec) -> FlowboardResult<()> {
        spec.validate()?;
        if self.child.is_some() {
            return Err(FlowboardError::render("recorder is already running"));
        }
        if let Some(parent) = self.out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .arg("-y")
            .args([
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", spec.width, spec.height),
                "-r",
                &spec.fps.to_string(),
                "-i",
                "pipe:0",
                "-an",
                // yuv420p needs even dimensions.
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            ])
            .args(codec_args(self.format))
            .arg(&self.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            FlowboardError::render(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FlowboardError::render("failed to open ffmpeg stdin"))?;

        tracing::debug!(
            output = %self.out_path.display(),
            width = spec.width,
            height = spec.height,
            fps = spec.fps,
            "Recorder started"
        );
        self.stderr = Some(StderrCapture::spawn(child.stderr.take()));
        self.spec = Some(spec);
        self.child = Some(child);
        self.stdin = Some(stdin);
        Ok(())
    }

    async fn push_frame(&mut self, frame: &RgbaImage) -> FlowboardResult<()> {
        let (Some(spec), Some(stdin)) = (self.spec, self.stdin.as_mut()) else {
            return Err(FlowboardError::render("recorder is not running"));
        };
        if frame.width() != spec.width || frame.height() != spec.height {
            return Err(FlowboardError::render(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                spec.width,
                spec.height
            )));
        }
        stdin
            .write_all(frame.as_raw())
            .await
            .map_err(|e| FlowboardError::render(format!("failed to write frame to ffmpeg: {e}")))
    }

    async fn finish(&mut self) -> FlowboardResult<PathBuf> {
        let Some(mut stdin) = self.stdin.take() else {
            return Err(FlowboardError::render("recorder is not running"));
        };
        let _ = stdin.shutdown().await;
        drop(stdin);

        let Some(mut child) = self.child.take() else {
            return Err(FlowboardError::render("recorder is not running"));
        };
        let status = child
            .wait()
            .await
            .map_err(|e| FlowboardError::render(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr = match self.stderr.take() {
            Some(capture) => capture.collect().await,
            None => String::new(),
        };
        self.spec = None;

        if !status.success() {
            let _ = tokio::fs::remove_file(&self.out_path).await;
            return Err(FlowboardError::render(format!(
                "ffmpeg exited with status {status}: {stderr}"
            )));
        }
        Ok(self.out_path.clone())
    }

    async fn abort(&mut self) {
        self.stdin = None;
        self.stderr = None;
        self.spec = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        if tokio::fs::remove_file(&self.out_path).await.is_ok() {
            tracing::debug!(output = %self.out_path.display(), "Discarded partial recording");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_validation_rejects_zero_sizes() {
        let spec = RecordingSpec {
            width: 0,
            height: 720,
            fps: 30,
        };
        assert!(spec.validate().is_err());
        assert!(RecordingSpec {
            width: 1280,
            height: 720,
            fps: 0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn codec_args_match_container() {
        assert!(codec_args(OutputFormat::Webm).contains(&"libvpx-vp9"));
        assert!(codec_args(OutputFormat::Mp4).contains(&"+faststart"));
    }

    #[tokio::test]
    async fn push_before_start_is_render_error() {
        let mut recorder = FfmpegRecorder::new("/tmp/never.webm", OutputFormat::Webm);
        let frame = RgbaImage::new(2, 2);
        let err = recorder.push_frame(&frame).await.unwrap_err();
        assert!(matches!(err, FlowboardError::Render { .. }));
    }
}
