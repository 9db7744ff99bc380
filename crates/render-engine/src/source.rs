//! Clip sources: probing and decoding generated clips.
//!
//! A [`ClipLoader`] opens a clip and reports its native geometry; the
//! resulting [`ClipSource`] then yields decoded RGBA frames in presentation
//! order. The production loader shells out to `ffprobe`/`ffmpeg` and
//! decodes at the output frame rate, so every decoded frame maps to exactly
//! one output frame.

use std::process::Stdio;

use async_trait::async_trait;
use flowboard_board_model::edge::ClipReference;
use flowboard_common::clock::FrameClock;
use flowboard_common::error::{FlowboardError, FlowboardResult};
use image::RgbaImage;
use serde::Deserialize;
use tokio::process::{Child, ChildStdout, Command};

use crate::process::{read_full, StderrCapture};

/// Native properties of a loaded clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    pub width: u32,
    pub height: u32,
    /// Native duration in seconds as reported by the container.
    pub duration_secs: f64,
}

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Presentation time relative to the start of the clip.
    pub pts_secs: f64,
    pub image: RgbaImage,
}

/// Opens clips for decoding.
#[async_trait]
pub trait ClipLoader: Send + Sync {
    /// Open `clip` and read its metadata. Fails with a media error naming
    /// the clip's URL.
    async fn load(&self, clip: &ClipReference) -> FlowboardResult<Box<dyn ClipSource>>;
}

/// A loaded clip that can be played from the start.
#[async_trait]
pub trait ClipSource: Send {
    fn info(&self) -> &ClipInfo;

    /// Seek to the beginning and start playback.
    async fn start(&mut self) -> FlowboardResult<()>;

    /// Next frame, or `None` at end of stream.
    async fn next_frame(&mut self) -> FlowboardResult<Option<DecodedFrame>>;

    /// Stop playback and release decoder resources.
    async fn pause(&mut self);
}

/// Loader backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegClipLoader {
    clock: FrameClock,
}

impl FfmpegClipLoader {
    /// Decode clips at `fps` frames per second.
    pub fn new(fps: u32) -> Self {
        Self {
            clock: FrameClock::new(fps),
        }
    }
}

#[async_trait]
impl ClipLoader for FfmpegClipLoader {
    async fn load(&self, clip: &ClipReference) -> FlowboardResult<Box<dyn ClipSource>> {
        let info = probe_clip(&clip.url).await?;
        tracing::debug!(
            url = %clip.url,
            width = info.width,
            height = info.height,
            duration = info.duration_secs,
            "Clip loaded"
        );
        Ok(Box::new(FfmpegClipSource {
            url: clip.url.clone(),
            info,
            clock: self.clock,
            child: None,
            stdout: None,
            stderr: None,
            frame_index: 0,
        }))
    }
}

/// Clip decoded by an `ffmpeg` child process writing raw RGBA to stdout.
struct FfmpegClipSource {
    url: String,
    info: ClipInfo,
    clock: FrameClock,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: Option<StderrCapture>,
    frame_index: u64,
}

impl FfmpegClipSource {
    fn frame_len(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 4
    }

    /// The decoder closed its output. A clean end of stream needs a zero
    /// exit status, at least one frame, and no partially written frame.
    async fn end_of_stream(&mut self, partial: usize) -> FlowboardResult<Option<DecodedFrame>> {
        self.stdout = None;
        let status = match self.child.take() {
            Some(mut child) => Some(child.wait().await.map_err(|e| {
                FlowboardError::media(&self.url, format!("failed to wait for ffmpeg: {e}"))
            })?),
            None => None,
        };
        let stderr = match self.stderr.take() {
            Some(capture) => capture.collect().await,
            None => String::new(),
        };

        if let Some(status) = status.filter(|s| !s.success()) {
            return Err(FlowboardError::media(
                &self.url,
                format!("ffmpeg exited with status {status}: {stderr}"),
            ));
        }
        if partial > 0 {
            return Err(FlowboardError::media(
                &self.url,
                format!(
                    "decoder stopped mid-frame ({partial} of {} bytes)",
                    self.frame_len()
                ),
            ));
        }
        if self.frame_index == 0 {
            return Err(FlowboardError::media(
                &self.url,
                format!("decoder produced no frames: {stderr}"),
            ));
        }

        tracing::debug!(url = %self.url, frames = self.frame_index, "Clip decoded to the end");
        Ok(None)
    }
}

#[async_trait]
impl ClipSource for FfmpegClipSource {
    fn info(&self) -> &ClipInfo {
        &self.info
    }

    async fn start(&mut self) -> FlowboardResult<()> {
        self.pause().await;

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", "0", "-i"])
            .arg(&self.url)
            .args([
                "-an",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-r",
                &self.clock.fps().to_string(),
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FlowboardError::media(&self.url, format!("failed to spawn ffmpeg: {e}")))?;

        self.stderr = Some(StderrCapture::spawn(child.stderr.take()));
        self.stdout = child.stdout.take();
        if self.stdout.is_none() {
            return Err(FlowboardError::media(&self.url, "failed to open ffmpeg stdout"));
        }
        self.child = Some(child);
        self.frame_index = 0;
        Ok(())
    }

    async fn next_frame(&mut self) -> FlowboardResult<Option<DecodedFrame>> {
        let mut buf = vec![0u8; self.frame_len()];
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(FlowboardError::media(&self.url, "clip is not playing"));
        };

        let filled = read_full(stdout, &mut buf)
            .await
            .map_err(|e| FlowboardError::media(&self.url, format!("decode failed: {e}")))?;
        if filled < buf.len() {
            return self.end_of_stream(filled).await;
        }

        let image = RgbaImage::from_raw(self.info.width, self.info.height, buf)
            .ok_or_else(|| FlowboardError::media(&self.url, "decoded frame has the wrong size"))?;
        let pts_secs = self.clock.time_of(self.frame_index);
        self.frame_index += 1;
        Ok(Some(DecodedFrame { pts_secs, image }))
    }

    async fn pause(&mut self) {
        self.stdout = None;
        self.stderr = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

/// Read width, height, and duration of a clip with `ffprobe`.
pub async fn probe_clip(url: &str) -> FlowboardResult<ClipInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,duration:format=duration",
            "-of",
            "json",
        ])
        .arg(url)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| FlowboardError::media(url, format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FlowboardError::media(
            url,
            format!("ffprobe exited with status {}: {}", output.status, stderr.trim()),
        ));
    }

    parse_probe_output(url, &output.stdout)
}

fn parse_probe_output(url: &str, raw: &[u8]) -> FlowboardResult<ClipInfo> {
    let parsed: ProbeOutput = serde_json::from_slice(raw)
        .map_err(|e| FlowboardError::media(url, format!("unreadable ffprobe output: {e}")))?;

    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| FlowboardError::media(url, "no video stream"))?;
    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(FlowboardError::media(url, "video stream has no dimensions")),
    };

    let duration_secs = stream
        .duration
        .as_deref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| FlowboardError::media(url, "clip duration is unknown"))?;

    Ok(ClipInfo {
        width,
        height,
        duration_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_output_prefers_stream_duration() {
        let raw = br#"{"streams":[{"width":1280,"height":720,"duration":"4.000000"}],
                       "format":{"duration":"4.050000"}}"#;
        let info = parse_probe_output("a.mp4", raw).unwrap();
        assert_eq!(
            info,
            ClipInfo {
                width: 1280,
                height: 720,
                duration_secs: 4.0
            }
        );
    }

    #[test]
    fn probe_output_falls_back_to_format_duration() {
        // WebM streams usually carry no per-stream duration.
        let raw = br#"{"streams":[{"width":640,"height":360}],"format":{"duration":"2.5"}}"#;
        assert_eq!(parse_probe_output("b.webm", raw).unwrap().duration_secs, 2.5);
    }

    #[test]
    fn probe_output_without_stream_is_media_error() {
        let err = parse_probe_output("c.mp4", br#"{"streams":[]}"#).unwrap_err();
        match err {
            FlowboardError::Media { url, .. } => assert_eq!(url, "c.mp4"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
