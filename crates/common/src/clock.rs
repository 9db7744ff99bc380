//! Clock and timing utilities.
//!
//! Generation jobs record their start as wall-clock milliseconds since the
//! Unix epoch, so a board reloaded from disk still reports a correct
//! elapsed timer. Composition works in output-frame time instead: every
//! frame pushed to the recorder advances the output by `1 / fps` seconds.

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whole seconds between `started_at_ms` and `now_ms`.
///
/// A start time in the future (clock skew) yields zero.
pub fn elapsed_whole_secs(started_at_ms: i64, now_ms: i64) -> u64 {
    if now_ms <= started_at_ms {
        return 0;
    }
    ((now_ms - started_at_ms) / 1000) as u64
}

/// Converts between output frame indices and seconds at a fixed rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    fps: u32,
}

impl FrameClock {
    /// Create a clock for the given frame rate. A zero rate is clamped to 1.
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    /// Frames per second.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(&self) -> f64 {
        1.0 / self.fps as f64
    }

    /// Presentation time of a frame index.
    pub fn time_of(&self, frame_index: u64) -> f64 {
        frame_index as f64 / self.fps as f64
    }

    /// Number of whole frames needed to cover `duration_secs`.
    pub fn frames_for(&self, duration_secs: f64) -> u64 {
        if duration_secs <= 0.0 {
            return 0;
        }
        // Tolerate float noise such as 2.0000000001 * 30.
        let exact = duration_secs * self.fps as f64;
        (exact - 1e-6).ceil().max(0.0) as u64
    }
}
