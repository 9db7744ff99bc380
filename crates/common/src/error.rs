//! Error types shared across Flowboard crates.

use std::path::PathBuf;

/// Top-level error type for Flowboard operations.
///
/// Variants follow the failure taxonomy of the pipeline: validation errors
/// are raised before any work starts, transport errors come from the job or
/// merge backends, job failures are reported by the backend itself, and
/// media errors identify the clip that could not be loaded or decoded.
#[derive(Debug, thiserror::Error)]
pub enum FlowboardError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Generation job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Media error for {url}: {message}")]
    Media { url: String, message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Graph error: {message}")]
    Graph { message: String },

    #[error("Diagram error: {message}")]
    Diagram { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using FlowboardError.
pub type FlowboardResult<T> = Result<T, FlowboardError>;

impl FlowboardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
        }
    }

    pub fn job_failed(job_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::JobFailed {
            job_id: job_id.into(),
            message: msg.into(),
        }
    }

    pub fn media(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Media {
            url: url.into(),
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph {
            message: msg.into(),
        }
    }

    pub fn diagram(msg: impl Into<String>) -> Self {
        Self::Diagram {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error belongs to the validation class (nothing was started).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Whether this error came from the network layer rather than the job itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
