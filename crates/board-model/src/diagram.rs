//! The collaborator boundary: what the core needs from the diagram.
//!
//! The diagram editor owns the authoritative shapes. The core only reads
//! frames and connectors, mutates them through the narrow surface below, and
//! subscribes to frame deletions so the frame graph can follow along.

use std::path::PathBuf;

use async_trait::async_trait;
use flowboard_common::error::FlowboardResult;
use serde::{Deserialize, Serialize};

use crate::edge::{ClipReference, EdgeState};
use crate::ids::{ConnectorId, FrameId};

/// Called with the id of a frame that is about to be deleted.
pub type FrameDeletionHandler = Box<dyn FnMut(&FrameId) + Send>;

/// A frame shape as seen by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub id: FrameId,

    /// Display name shown on the frame.
    #[serde(default)]
    pub name: String,

    /// Source image placed in the frame, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Still extracted from the clip that produced this frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub still: Option<PathBuf>,
}

impl FrameRecord {
    pub fn new(id: FrameId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image: None,
            still: None,
        }
    }
}

/// A connector shape with its resolved endpoint bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorRecord {
    pub id: ConnectorId,

    /// Frame bound to the arrow's start terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<FrameId>,

    /// Frame bound to the arrow's end terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<FrameId>,

    /// Prompt used for the generation step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default)]
    pub state: EdgeState,

    /// Branch index of `end` under `start`, recorded when the link was made
    /// so a reloaded board keeps the same numbering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<u32>,
}

impl ConnectorRecord {
    /// An idle link from `start` to `end`.
    pub fn link(id: ConnectorId, start: FrameId, end: FrameId) -> Self {
        Self {
            id,
            start: Some(start),
            end: Some(end),
            prompt: None,
            state: EdgeState::Idle,
            branch: None,
        }
    }

    /// Both terminals bound.
    pub fn endpoints(&self) -> Option<(&FrameId, &FrameId)> {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

/// Fields of a connector that may be changed after creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectorUpdate {
    /// New lifecycle state; subject to [`EdgeState::can_transition_to`].
    pub state: Option<EdgeState>,

    /// New trim point for a `Done` connector (`Some(None)` clears it).
    pub trim_end: Option<Option<f64>>,
}

impl ConnectorUpdate {
    pub fn state(state: EdgeState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn trim_end(trim_end: Option<f64>) -> Self {
        Self {
            trim_end: Some(trim_end),
            ..Self::default()
        }
    }
}

/// Display fields of a frame that may be changed after creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameUpdate {
    pub name: Option<String>,
    pub still: Option<PathBuf>,
}

/// Errors raised by a diagram when a mutation is refused.
#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
    #[error("Unknown frame: {0}")]
    UnknownFrame(FrameId),

    #[error("Unknown connector: {0}")]
    UnknownConnector(ConnectorId),

    #[error("Duplicate shape id: {0}")]
    DuplicateId(String),

    #[error("Connector {id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: ConnectorId,
        from: &'static str,
        to: &'static str,
    },

    #[error("Connector {id} has no clip to trim")]
    NotTrimmable { id: ConnectorId },
}

impl From<DiagramError> for flowboard_common::FlowboardError {
    fn from(err: DiagramError) -> Self {
        flowboard_common::FlowboardError::diagram(err.to_string())
    }
}

/// Read/mutate interface the core consumes from the diagram editor.
pub trait Diagram: Send {
    /// All frames currently on the board.
    fn list_frames(&self) -> Vec<FrameRecord>;

    /// All connectors, in a stable order (creation order).
    fn list_connectors(&self) -> Vec<ConnectorRecord>;

    fn frame(&self, id: &FrameId) -> Option<FrameRecord>;

    fn connector(&self, id: &ConnectorId) -> Option<ConnectorRecord>;

    /// Register a hook invoked before any frame is removed.
    fn on_before_frame_deleted(&mut self, handler: FrameDeletionHandler);

    fn create_frame(&mut self, frame: FrameRecord) -> Result<(), DiagramError>;

    fn create_connector(&mut self, connector: ConnectorRecord) -> Result<(), DiagramError>;

    /// Delete a frame, unbinding any connector terminals attached to it.
    /// Returns false if the frame did not exist.
    fn delete_frame(&mut self, id: &FrameId) -> bool;

    /// Returns false if the connector did not exist.
    fn delete_connector(&mut self, id: &ConnectorId) -> bool;

    fn update_connector_metadata(
        &mut self,
        id: &ConnectorId,
        update: ConnectorUpdate,
    ) -> Result<(), DiagramError>;

    fn update_frame_metadata(&mut self, id: &FrameId, update: FrameUpdate)
        -> Result<(), DiagramError>;

    /// Connectors whose job is still outstanding.
    fn pending_connectors(&self) -> Vec<ConnectorRecord> {
        self.list_connectors()
            .into_iter()
            .filter(|c| c.state.is_pending())
            .collect()
    }
}

/// Produces a representative still image from the final moment of a clip.
///
/// This is display sugar: failures are reported but never affect the
/// generation state machine.
#[async_trait]
pub trait StillExtractor: Send + Sync {
    async fn extract_last_frame(
        &self,
        clip: &ClipReference,
        frame: &FrameId,
    ) -> FlowboardResult<PathBuf>;
}
