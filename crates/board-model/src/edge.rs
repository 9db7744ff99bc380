//! Generation state carried by connectors.
//!
//! A connector is the edge of a generation step: it is created `Pending`
//! together with its (still empty) target frame and is driven to a terminal
//! state by the job poller. Once `Done` or `Errored` it never changes state
//! again.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A reference to one generated clip, as consumed by the compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipReference {
    /// Where the clip can be fetched (URL or local path).
    pub url: String,

    /// Clip duration reported by the backend, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,

    /// User-applied truncation point in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<f64>,
}

impl ClipReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            duration_secs: None,
            trim_end: None,
        }
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_trim_end(mut self, secs: f64) -> Self {
        self.trim_end = Some(secs);
        self
    }

    /// Where playback of this clip stops: the trim point if set, otherwise
    /// the known duration, otherwise `native_duration_secs` (as probed when
    /// the clip is loaded).
    pub fn effective_end(&self, native_duration_secs: f64) -> f64 {
        self.trim_end
            .or(self.duration_secs.filter(|d| *d > 0.0))
            .unwrap_or(native_duration_secs)
    }
}

/// Lifecycle state of a connector's generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EdgeState {
    /// A plain link drawn by the user; no job attached.
    #[default]
    Idle,

    /// Job submitted and not yet resolved.
    Pending {
        job_id: String,
        /// Wall-clock start in milliseconds since the Unix epoch.
        started_at_ms: i64,
        /// Whole seconds elapsed as last displayed.
        #[serde(default)]
        timer_secs: u64,
    },

    /// Job finished; the clip is ready.
    Done {
        job_id: String,
        clip: ClipReference,
        /// Still image of the clip's last moment, when one was extracted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_frame: Option<PathBuf>,
    },

    /// The backend reported the job as failed.
    Errored { job_id: String },
}

impl EdgeState {
    pub fn pending(job_id: impl Into<String>, started_at_ms: i64) -> Self {
        Self::Pending {
            job_id: job_id.into(),
            started_at_ms,
            timer_secs: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// `Done` and `Errored` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Errored { .. })
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Pending { job_id, .. }
            | Self::Done { job_id, .. }
            | Self::Errored { job_id } => Some(job_id),
        }
    }

    pub fn clip(&self) -> Option<&ClipReference> {
        match self {
            Self::Done { clip, .. } => Some(clip),
            _ => None,
        }
    }

    /// Short lowercase label used in logs and the CLI.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending { .. } => "pending",
            Self::Done { .. } => "done",
            Self::Errored { .. } => "error",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Terminal states only accept a refresh of the same variant for the
    /// same job (e.g. attaching a still image to a `Done` edge).
    pub fn can_transition_to(&self, next: &EdgeState) -> bool {
        match (self, next) {
            (Self::Idle, _) => true,
            (Self::Pending { job_id: a, .. }, Self::Pending { job_id: b, .. })
            | (Self::Pending { job_id: a, .. }, Self::Done { job_id: b, .. })
            | (Self::Pending { job_id: a, .. }, Self::Errored { job_id: b }) => a == b,
            (Self::Done { job_id: a, .. }, Self::Done { job_id: b, .. }) => a == b,
            (Self::Errored { job_id: a }, Self::Errored { job_id: b }) => a == b,
            _ => false,
        }
    }
}
