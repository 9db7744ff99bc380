//! Rebuild the frame graph from diagram state.
//!
//! The diagram is the only authoritative record of how frames relate, so
//! the graph is derived from it whenever the two may have drifted apart
//! (board load, external edits). Connectors that do not describe a valid
//! forest edge are skipped, never fatal.
//!
//! Branch indices stored on connectors are honoured. They are reserved
//! before any connector is attached, so connectors without one are numbered
//! after them and a gap left by a deleted child stays a gap.

use flowboard_board_model::diagram::{ConnectorRecord, Diagram};
use flowboard_board_model::ids::{ConnectorId, FrameId};

use crate::store::{FrameGraph, GraphError};

/// The part of a connector that matters for reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorEndpoints {
    pub connector_id: ConnectorId,
    pub start: Option<FrameId>,
    pub end: Option<FrameId>,
    pub branch: Option<u32>,
}

impl From<&ConnectorRecord> for ConnectorEndpoints {
    fn from(record: &ConnectorRecord) -> Self {
        Self {
            connector_id: record.id.clone(),
            start: record.start.clone(),
            end: record.end.clone(),
            branch: record.branch,
        }
    }
}

/// Build a graph from frame ids and connectors, applying connectors in the
/// order given.
pub fn reconstruct<I>(frames: I, connectors: &[ConnectorEndpoints]) -> FrameGraph
where
    I: IntoIterator<Item = FrameId>,
{
    let mut graph = FrameGraph::new();
    for frame in frames {
        graph.insert_root(frame);
    }

    for connector in connectors {
        if let (Some(parent), Some(index)) = (&connector.start, connector.branch) {
            graph.reserve_branch(parent, index);
        }
    }

    let mut attached = 0usize;
    for connector in connectors {
        let (Some(parent), Some(child)) = (&connector.start, &connector.end) else {
            tracing::debug!(connector = %connector.connector_id, "Skipping unbound connector");
            continue;
        };
        if !graph.contains(parent) || !graph.contains(child) {
            tracing::debug!(
                connector = %connector.connector_id,
                parent = %parent,
                child = %child,
                "Skipping connector bound to a missing frame"
            );
            continue;
        }

        match graph.attach_at(
            child,
            connector.connector_id.clone(),
            parent,
            connector.branch,
        ) {
            Ok(_) => attached += 1,
            Err(GraphError::AlreadyAttached { parent: existing, .. }) => {
                tracing::warn!(
                    connector = %connector.connector_id,
                    child = %child,
                    existing_parent = %existing,
                    "Skipping connector that would give a frame a second parent"
                );
            }
            Err(e) => {
                tracing::warn!(
                    connector = %connector.connector_id,
                    error = %e,
                    "Skipping connector"
                );
            }
        }
    }

    tracing::debug!(frames = graph.len(), edges = attached, "Frame graph reconstructed");
    graph
}

/// Build a graph from everything currently on `diagram`.
pub fn reconstruct_from<D: Diagram + ?Sized>(diagram: &D) -> FrameGraph {
    let connectors: Vec<ConnectorEndpoints> = diagram
        .list_connectors()
        .iter()
        .map(ConnectorEndpoints::from)
        .collect();
    reconstruct(diagram.list_frames().into_iter().map(|f| f.id), &connectors)
}
