//! The frame graph store.
//!
//! A forest of [`FrameNode`]s keyed by frame id. Every node has at most one
//! parent, children are kept under stable branch indices, and no operation
//! may introduce a cycle.

use std::collections::HashMap;
use std::fmt::Write as _;

use flowboard_board_model::ids::{ConnectorId, FrameId};
use flowboard_common::FlowboardError;

use crate::node::FrameNode;

/// Errors raised when a graph mutation would break the forest invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Frame {frame} is already attached to {parent}")]
    AlreadyAttached { frame: FrameId, parent: FrameId },

    #[error("Attaching {frame} under {parent} would create a cycle")]
    Cycle { frame: FrameId, parent: FrameId },

    #[error("Frame {frame}: a connector requires a parent and a parent requires a connector")]
    ArrowParentMismatch { frame: FrameId },

    #[error("Frame {0} already exists")]
    DuplicateFrame(FrameId),
}

impl From<GraphError> for FlowboardError {
    fn from(err: GraphError) -> Self {
        FlowboardError::graph(err.to_string())
    }
}

/// Parent/child relationships between frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameGraph {
    nodes: HashMap<FrameId, FrameNode>,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, frame_id: &FrameId) -> bool {
        self.nodes.contains_key(frame_id)
    }

    pub fn get(&self, frame_id: &FrameId) -> Option<&FrameNode> {
        self.nodes.get(frame_id)
    }

    /// All nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &FrameNode> {
        self.nodes.values()
    }

    /// Insert a frame, optionally attached under `parent_id` via `arrow_id`.
    ///
    /// An unknown parent is created as a placeholder root. A frame that
    /// already exists as a root is attached in place and keeps its children.
    pub fn add_node(
        &mut self,
        frame_id: FrameId,
        arrow_id: Option<ConnectorId>,
        parent_id: Option<FrameId>,
    ) -> Result<(), GraphError> {
        match (arrow_id, parent_id) {
            (None, None) => match self.nodes.get(&frame_id) {
                Some(existing) if existing.is_root() => Ok(()),
                Some(_) => Err(GraphError::DuplicateFrame(frame_id)),
                None => {
                    self.insert_root(frame_id);
                    Ok(())
                }
            },
            (Some(arrow_id), Some(parent_id)) => {
                self.attach(&frame_id, arrow_id, &parent_id).map(|_| ())
            }
            _ => Err(GraphError::ArrowParentMismatch { frame: frame_id }),
        }
    }

    /// Insert a parentless node unless one already exists.
    pub(crate) fn insert_root(&mut self, frame_id: FrameId) {
        self.nodes
            .entry(frame_id.clone())
            .or_insert_with(|| FrameNode::root(frame_id));
    }

    /// Attach `child` under `parent`, creating either as a root first if
    /// it is unknown. Nothing is inserted when the attachment is refused.
    ///
    /// Returns the branch index the child was given.
    pub(crate) fn attach(
        &mut self,
        child: &FrameId,
        arrow_id: ConnectorId,
        parent: &FrameId,
    ) -> Result<u32, GraphError> {
        self.attach_at(child, arrow_id, parent, None)
    }

    /// Like [`attach`], but reuses `branch` when that slot under the parent
    /// is free.
    ///
    /// [`attach`]: FrameGraph::attach
    pub(crate) fn attach_at(
        &mut self,
        child: &FrameId,
        arrow_id: ConnectorId,
        parent: &FrameId,
        branch: Option<u32>,
    ) -> Result<u32, GraphError> {
        if let Some(current) = self.nodes.get(child).and_then(|n| n.parent_id.clone()) {
            return Err(GraphError::AlreadyAttached {
                frame: child.clone(),
                parent: current,
            });
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(GraphError::Cycle {
                frame: child.clone(),
                parent: parent.clone(),
            });
        }

        let parent_node = self
            .nodes
            .entry(parent.clone())
            .or_insert_with(|| FrameNode::root(parent.clone()));
        let index = match branch {
            Some(index) => parent_node.insert_child_at(index, child.clone()),
            None => parent_node.push_child(child.clone()),
        };
        let node = self
            .nodes
            .entry(child.clone())
            .or_insert_with(|| FrameNode::root(child.clone()));
        node.parent_id = Some(parent.clone());
        node.arrow_id = Some(arrow_id);
        Ok(index)
    }

    /// Whether `ancestor` lies on the parent chain of `frame_id`.
    fn is_ancestor(&self, ancestor: &FrameId, frame_id: &FrameId) -> bool {
        let mut current = self.nodes.get(frame_id).and_then(|n| n.parent_id.as_ref());
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent_id.as_ref());
        }
        false
    }

    /// Remove a frame and its whole subtree.
    ///
    /// Returns the removed ids, children before their parents. Unknown ids
    /// are a no-op.
    pub fn remove_node(&mut self, frame_id: &FrameId) -> Vec<FrameId> {
        let Some(parent_id) = self.nodes.get(frame_id).map(|n| n.parent_id.clone()) else {
            return Vec::new();
        };
        if let Some(parent) = parent_id.and_then(|p| self.nodes.get_mut(&p)) {
            parent.forget_child(frame_id);
        }

        let mut removed = Vec::new();
        self.remove_subtree(frame_id, &mut removed);
        tracing::debug!(frame = %frame_id, removed = removed.len(), "Removed frame subtree");
        removed
    }

    fn remove_subtree(&mut self, frame_id: &FrameId, removed: &mut Vec<FrameId>) {
        let Some(node) = self.nodes.remove(frame_id) else {
            return;
        };
        for child in node.children.values() {
            self.remove_subtree(child, removed);
        }
        removed.push(node.frame_id);
    }

    /// Parentless nodes, ordered by frame id.
    pub fn root_frames(&self) -> Vec<&FrameNode> {
        self.sorted_where(FrameNode::is_root)
    }

    /// Childless nodes, ordered by frame id.
    pub fn leaf_frames(&self) -> Vec<&FrameNode> {
        self.sorted_where(FrameNode::is_leaf)
    }

    fn sorted_where(&self, keep: impl Fn(&FrameNode) -> bool) -> Vec<&FrameNode> {
        let mut selected: Vec<&FrameNode> = self.nodes.values().filter(|&n| keep(n)).collect();
        selected.sort_by(|a, b| a.frame_id.cmp(&b.frame_id));
        selected
    }

    /// The chain root → … → `frame_id`, or empty for an unknown frame.
    pub fn path_to_root(&self, frame_id: &FrameId) -> Vec<&FrameNode> {
        let mut path = Vec::new();
        let mut current = self.nodes.get(frame_id);
        while let Some(node) = current {
            path.push(node);
            current = node.parent_id.as_ref().and_then(|p| self.nodes.get(p));
        }
        path.reverse();
        path
    }

    /// All descendants in pre-order, children visited by branch index.
    /// The node itself is not included.
    pub fn descendants_of(&self, frame_id: &FrameId) -> Vec<&FrameNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&FrameId> = match self.nodes.get(frame_id) {
            Some(node) => node.children.values().rev().collect(),
            None => return out,
        };
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push(node);
                stack.extend(node.children.values().rev());
            }
        }
        out
    }

    /// Keep `index` out of circulation under `parent_id`. Unknown parents
    /// are ignored.
    pub(crate) fn reserve_branch(&mut self, parent_id: &FrameId, index: u32) {
        if let Some(node) = self.nodes.get_mut(parent_id) {
            node.reserve_branch(index);
        }
    }

    /// Index the next child attached under `parent_id` will get.
    pub fn next_branch_of(&self, parent_id: &FrameId) -> u32 {
        self.nodes.get(parent_id).map_or(0, FrameNode::next_branch)
    }

    /// Branch index of `child_id` under `parent_id`.
    pub fn branch_index_of(&self, parent_id: &FrameId, child_id: &FrameId) -> Option<u32> {
        self.nodes.get(parent_id)?.branch_of(child_id)
    }

    /// Indented text view of the forest, one frame per line.
    ///
    /// `label` supplies the text shown after each frame id (e.g. its name).
    pub fn render_tree(&self, label: impl Fn(&FrameNode) -> String) -> String {
        let mut out = String::new();
        for root in self.root_frames() {
            self.render_node(root, None, 0, &label, &mut out);
        }
        out
    }

    fn render_node(
        &self,
        node: &FrameNode,
        branch: Option<u32>,
        depth: usize,
        label: &impl Fn(&FrameNode) -> String,
        out: &mut String,
    ) {
        let indent = "  ".repeat(depth);
        let text = label(node);
        let _ = match branch {
            Some(index) => writeln!(out, "{indent}[{index}] {} {text}", node.frame_id),
            None => writeln!(out, "{indent}{} {text}", node.frame_id),
        };
        for (index, child) in &node.children {
            if let Some(child) = self.nodes.get(child) {
                self.render_node(child, Some(*index), depth + 1, label, out);
            }
        }
    }
}
