//! Sequential compositor: plays clips one after another onto a shared
//! canvas and records the result.
//!
//! Clip N+1 is only started after clip N's draw loop has terminated, either
//! at end of stream or when a decoded frame reaches the clip's effective
//! end (trim point, known duration, or native duration).

use std::path::PathBuf;
use std::sync::Arc;

use flowboard_board_model::edge::ClipReference;
use flowboard_common::cancel::CancelFlag;
use flowboard_common::clock::FrameClock;
use flowboard_common::error::{FlowboardError, FlowboardResult};

use crate::canvas::Canvas;
use crate::recorder::{FrameRecorder, RecordingSpec};
use crate::source::{ClipLoader, ClipSource};

/// Progress callback for merge runs.
pub type MergeProgressCallback = Box<dyn Fn(MergeProgress) + Send>;

/// Merge progress report, emitted after each clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeProgress {
    /// Clips fully drawn.
    pub completed: usize,
    pub total: usize,
    /// Output frames recorded so far.
    pub frames: u64,
}

impl MergeProgress {
    /// Completed fraction in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// The finished output of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedVideo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frames: u64,
    pub duration_secs: f64,
}

/// Composites an ordered list of clips into one recording.
pub struct SequentialCompositor {
    loader: Arc<dyn ClipLoader>,
    clock: FrameClock,
    background: [u8; 4],
    cancel: CancelFlag,
}

impl SequentialCompositor {
    pub fn new(loader: Arc<dyn ClipLoader>, fps: u32) -> Self {
        Self {
            loader,
            clock: FrameClock::new(fps),
            background: [0, 0, 0, 255],
            cancel: CancelFlag::new(),
        }
    }

    /// Colour of the letterbox area around smaller clips.
    pub fn with_background(mut self, rgba: [u8; 4]) -> Self {
        self.background = rgba;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Merge `clips` in order into `recorder`.
    ///
    /// Needs at least two clips. Any failure or cancellation discards the
    /// partial recording.
    pub async fn merge(
        &self,
        clips: &[ClipReference],
        recorder: &mut dyn FrameRecorder,
        progress: Option<&MergeProgressCallback>,
    ) -> FlowboardResult<MergedVideo> {
        if clips.len() < 2 {
            return Err(FlowboardError::validation(format!(
                "At least 2 videos are required for merging, got {}",
                clips.len()
            )));
        }

        tracing::info!(clips = clips.len(), fps = self.clock.fps(), "Starting merge");

        let mut sources = Vec::with_capacity(clips.len());
        for clip in clips {
            if self.cancel.is_cancelled() {
                return Err(FlowboardError::Cancelled);
            }
            let source = self.loader.load(clip).await.map_err(|e| match e {
                e @ FlowboardError::Media { .. } => e,
                other => FlowboardError::media(&clip.url, other.to_string()),
            })?;
            sources.push(source);
        }

        let mut canvas = Canvas::fitting(sources.iter().map(|s| s.info()), self.background)
            .ok_or_else(|| FlowboardError::validation("no clips to merge"))?;
        let spec = RecordingSpec {
            width: canvas.width(),
            height: canvas.height(),
            fps: self.clock.fps(),
        };
        recorder.start(spec).await?;

        match self
            .draw_all(clips, &mut sources, &mut canvas, recorder, progress)
            .await
        {
            Ok(frames) => {
                let path = recorder.finish().await?;
                let merged = MergedVideo {
                    path,
                    width: spec.width,
                    height: spec.height,
                    frames,
                    duration_secs: self.clock.time_of(frames),
                };
                tracing::info!(
                    output = %merged.path.display(),
                    frames = merged.frames,
                    duration = merged.duration_secs,
                    "Merge complete"
                );
                Ok(merged)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Merge failed, discarding partial output");
                recorder.abort().await;
                Err(e)
            }
        }
    }

    async fn draw_all(
        &self,
        clips: &[ClipReference],
        sources: &mut [Box<dyn ClipSource>],
        canvas: &mut Canvas,
        recorder: &mut dyn FrameRecorder,
        progress: Option<&MergeProgressCallback>,
    ) -> FlowboardResult<u64> {
        let total = clips.len();
        let mut frames = 0u64;

        for (index, (clip, source)) in clips.iter().zip(sources.iter_mut()).enumerate() {
            let result = self.draw_clip(clip, source.as_mut(), canvas, recorder).await;
            source.pause().await;
            let drawn = result?;
            frames += drawn;

            tracing::debug!(url = %clip.url, index, frames = drawn, "Clip drawn");
            if let Some(cb) = progress {
                cb(MergeProgress {
                    completed: index + 1,
                    total,
                    frames,
                });
            }
        }
        Ok(frames)
    }

    async fn draw_clip(
        &self,
        clip: &ClipReference,
        source: &mut dyn ClipSource,
        canvas: &mut Canvas,
        recorder: &mut dyn FrameRecorder,
    ) -> FlowboardResult<u64> {
        let end = clip.effective_end(source.info().duration_secs);
        canvas.clear();
        source.start().await.map_err(|e| media_error(clip, e))?;

        let mut drawn = 0u64;
        loop {
            tokio::task::yield_now().await;
            if self.cancel.is_cancelled() {
                return Err(FlowboardError::Cancelled);
            }

            let Some(frame) = source.next_frame().await.map_err(|e| media_error(clip, e))? else {
                break;
            };
            if frame.pts_secs >= end {
                break;
            }

            canvas.draw_centered(&frame.image);
            recorder.push_frame(canvas.image()).await?;
            drawn += 1;
        }
        Ok(drawn)
    }
}

fn media_error(clip: &ClipReference, err: FlowboardError) -> FlowboardError {
    match err {
        FlowboardError::Media { .. } | FlowboardError::Cancelled => err,
        other => FlowboardError::media(&clip.url, other.to_string()),
    }
}
