//! The storyboard coordinator.
//!
//! `Storyboard` owns the diagram and the frame graph derived from it. All
//! structural edits go through here so the two stay in step; the only other
//! writer of the graph is the diagram's before-delete hook, which shares the
//! same lock.

use std::sync::Arc;

use flowboard_board_model::diagram::{ConnectorRecord, ConnectorUpdate, Diagram, FrameRecord};
use flowboard_board_model::edge::{ClipReference, EdgeState};
use flowboard_board_model::ids::{ConnectorId, FrameId};
use flowboard_common::error::{FlowboardError, FlowboardResult};
use parking_lot::Mutex;

use crate::reconstruct::reconstruct_from;
use crate::store::FrameGraph;

/// Name given to a target frame while its clip is generated.
pub const GENERATING_FRAME_NAME: &str = "Generating...";

/// The graph handle shared with the diagram's deletion hook.
pub type SharedFrameGraph = Arc<Mutex<FrameGraph>>;

/// Shapes created for one generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGeneration {
    pub connector_id: ConnectorId,
    pub target_id: FrameId,
}

/// Diagram plus frame graph, kept consistent.
pub struct Storyboard<D: Diagram> {
    diagram: D,
    graph: SharedFrameGraph,
}

impl<D: Diagram> Storyboard<D> {
    /// Take ownership of `diagram`, build its graph, and subscribe to frame
    /// deletions so removed frames leave the graph with their subtrees.
    pub fn new(mut diagram: D) -> Self {
        let graph: SharedFrameGraph = Arc::new(Mutex::new(reconstruct_from(&diagram)));

        let hook = Arc::clone(&graph);
        diagram.on_before_frame_deleted(Box::new(move |frame| {
            let removed = hook.lock().remove_node(frame);
            if !removed.is_empty() {
                tracing::debug!(
                    frame = %frame,
                    removed = removed.len(),
                    "Graph followed frame deletion"
                );
            }
        }));

        Self { diagram, graph }
    }

    /// Rebuild the graph from the diagram's current state.
    pub fn reconstruct(&self) {
        let rebuilt = reconstruct_from(&self.diagram);
        *self.graph.lock() = rebuilt;
    }

    pub fn diagram(&self) -> &D {
        &self.diagram
    }

    /// Mutable access to the diagram. Frame deletions made through it are
    /// mirrored in the graph; new connectors are not until [`reconstruct`].
    ///
    /// [`reconstruct`]: Storyboard::reconstruct
    pub fn diagram_mut(&mut self) -> &mut D {
        &mut self.diagram
    }

    pub fn into_diagram(self) -> D {
        self.diagram
    }

    /// Run `f` against the current graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&FrameGraph) -> R) -> R {
        f(&self.graph.lock())
    }

    /// A copy of the current graph.
    pub fn snapshot(&self) -> FrameGraph {
        self.graph.lock().clone()
    }

    pub fn root_frames(&self) -> Vec<FrameId> {
        self.with_graph(|g| g.root_frames().iter().map(|n| n.frame_id.clone()).collect())
    }

    pub fn leaf_frames(&self) -> Vec<FrameId> {
        self.with_graph(|g| g.leaf_frames().iter().map(|n| n.frame_id.clone()).collect())
    }

    pub fn path_to_root(&self, frame: &FrameId) -> Vec<FrameId> {
        self.with_graph(|g| {
            g.path_to_root(frame)
                .iter()
                .map(|n| n.frame_id.clone())
                .collect()
        })
    }

    pub fn descendants_of(&self, frame: &FrameId) -> Vec<FrameId> {
        self.with_graph(|g| {
            g.descendants_of(frame)
                .iter()
                .map(|n| n.frame_id.clone())
                .collect()
        })
    }

    pub fn branch_index_of(&self, parent: &FrameId, child: &FrameId) -> Option<u32> {
        self.with_graph(|g| g.branch_index_of(parent, child))
    }

    /// Create the target frame, the pending connector, and the graph node
    /// for a freshly submitted generation job.
    pub fn request_generation(
        &mut self,
        source: &FrameId,
        job_id: impl Into<String>,
        started_at_ms: i64,
        prompt: Option<String>,
    ) -> FlowboardResult<PendingGeneration> {
        let source_record = self
            .diagram
            .frame(source)
            .ok_or_else(|| FlowboardError::validation(format!("Unknown source frame: {source}")))?;

        let target_id = FrameId::generate();
        let connector_id = ConnectorId::generate();

        let mut target = FrameRecord::new(target_id.clone(), GENERATING_FRAME_NAME);
        target.image = source_record
            .still
            .as_ref()
            .map(|p| p.display().to_string())
            .or(source_record.image);
        self.diagram.create_frame(target)?;

        let branch = self.graph.lock().next_branch_of(source);
        let connector = ConnectorRecord {
            id: connector_id.clone(),
            start: Some(source.clone()),
            end: Some(target_id.clone()),
            prompt,
            state: EdgeState::pending(job_id, started_at_ms),
            branch: Some(branch),
        };
        if let Err(e) = self.diagram.create_connector(connector) {
            self.diagram.delete_frame(&target_id);
            return Err(e.into());
        }

        let attached = self.graph.lock().attach_at(
            &target_id,
            connector_id.clone(),
            source,
            Some(branch),
        );
        if let Err(e) = attached {
            self.diagram.delete_connector(&connector_id);
            self.diagram.delete_frame(&target_id);
            return Err(e.into());
        }

        tracing::info!(
            source = %source,
            target = %target_id,
            connector = %connector_id,
            "Generation requested"
        );
        Ok(PendingGeneration {
            connector_id,
            target_id,
        })
    }

    /// Delete a connector together with the frame it produced.
    ///
    /// Returns the removed target frame, if the connector had one.
    pub fn discard_generation(&mut self, connector: &ConnectorId) -> Option<FrameId> {
        let target = self.diagram.connector(connector).and_then(|c| c.end);
        self.diagram.delete_connector(connector);
        if let Some(target) = &target {
            self.diagram.delete_frame(target);
        }
        target
    }

    /// Set or clear the trim point of a finished connector's clip.
    pub fn set_trim_end(
        &mut self,
        connector: &ConnectorId,
        trim_end: Option<f64>,
    ) -> FlowboardResult<()> {
        let record = self
            .diagram
            .connector(connector)
            .ok_or_else(|| FlowboardError::validation(format!("Unknown connector: {connector}")))?;
        let clip = record.state.clip().ok_or_else(|| {
            FlowboardError::validation(format!(
                "Connector {connector} is {}, only finished clips can be trimmed",
                record.state.label()
            ))
        })?;

        if let Some(end) = trim_end {
            if !end.is_finite() || end <= 0.0 {
                return Err(FlowboardError::validation(format!(
                    "Trim end must be a positive number of seconds, got {end}"
                )));
            }
            if let Some(duration) = clip.duration_secs.filter(|d| *d > 0.0) {
                if end > duration {
                    return Err(FlowboardError::validation(format!(
                        "Trim end {end}s exceeds clip duration {duration}s"
                    )));
                }
            }
        }

        self.diagram
            .update_connector_metadata(connector, ConnectorUpdate::trim_end(trim_end))?;
        Ok(())
    }

    /// Clip references along the path from the root to `frame`, in playback
    /// order.
    pub fn clip_path(&self, frame: &FrameId) -> FlowboardResult<Vec<ClipReference>> {
        let arrows: Vec<ConnectorId> = self.with_graph(|g| {
            g.path_to_root(frame)
                .iter()
                .filter_map(|n| n.arrow_id.clone())
                .collect()
        });
        if !self.with_graph(|g| g.contains(frame)) {
            return Err(FlowboardError::validation(format!("Unknown frame: {frame}")));
        }

        arrows
            .iter()
            .map(|arrow| {
                let record = self.diagram.connector(arrow).ok_or_else(|| {
                    FlowboardError::validation(format!(
                        "Connector {arrow} is missing from the board"
                    ))
                })?;
                record.state.clip().cloned().ok_or_else(|| {
                    FlowboardError::validation(format!(
                        "Connector {arrow} is {}, not done",
                        record.state.label()
                    ))
                })
            })
            .collect()
    }
}
