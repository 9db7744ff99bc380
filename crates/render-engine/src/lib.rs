//! Flowboard Render Engine
//!
//! Turns an ordered path of generated clips into one continuous video.
//!
//! # Pipeline Architecture
//!
//! ```text
//! clip A ──┐
//!          ├── Load (ffprobe: size, duration)
//! clip B ──┘         │
//!                    ├── Canvas (max width × max height, centered)
//!                    │
//!                    ├── Play A until its trim end, then B, ...
//!                    │
//!                    ▼
//!              Record (ffmpeg rawvideo → VP9/H.264)
//!                    │
//!                    ▼
//!            merged-video.webm
//! ```
//!
//! A server-side merge client and still-frame extraction live here too.

pub mod canvas;
pub mod compositor;
pub mod export;
mod process;
pub mod recorder;
pub mod remote;
pub mod source;
pub mod still;

pub use canvas::Canvas;
pub use compositor::{MergeProgress, MergeProgressCallback, MergedVideo, SequentialCompositor};
pub use export::*;
pub use recorder::{FfmpegRecorder, FrameRecorder, RecordingSpec};
pub use remote::HttpMergeBackend;
pub use source::{ClipInfo, ClipLoader, ClipSource, DecodedFrame, FfmpegClipLoader};
pub use still::FfmpegStillExtractor;
