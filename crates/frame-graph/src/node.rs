//! A single node of the frame graph.

use std::collections::BTreeMap;

use flowboard_board_model::ids::{ConnectorId, FrameId};
use serde::Serialize;

/// One frame and its position in the storyboard forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameNode {
    pub frame_id: FrameId,

    /// Connector that produced this frame; `None` for a root.
    pub arrow_id: Option<ConnectorId>,

    /// Single parent; `None` for a root.
    pub parent_id: Option<FrameId>,

    /// Branch index → child frame, in attachment order.
    pub children: BTreeMap<u32, FrameId>,

    /// Next branch index to hand out. Indices are never reused, so a
    /// removed child leaves a gap.
    #[serde(skip)]
    next_branch: u32,
}

impl FrameNode {
    /// A parentless node with no children.
    pub fn root(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            arrow_id: None,
            parent_id: None,
            children: BTreeMap::new(),
            next_branch: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn next_branch(&self) -> u32 {
        self.next_branch
    }

    /// Register `child` under the next branch index and return that index.
    pub(crate) fn push_child(&mut self, child: FrameId) -> u32 {
        let index = self.next_branch;
        self.children.insert(index, child);
        self.next_branch += 1;
        index
    }

    /// Register `child` under `index` if that slot is free, otherwise under
    /// the next branch index. Returns the index used.
    pub(crate) fn insert_child_at(&mut self, index: u32, child: FrameId) -> u32 {
        if self.children.contains_key(&index) {
            return self.push_child(child);
        }
        self.children.insert(index, child);
        self.reserve_branch(index);
        index
    }

    /// Make sure `index` is never handed out by [`push_child`].
    ///
    /// [`push_child`]: FrameNode::push_child
    pub(crate) fn reserve_branch(&mut self, index: u32) {
        self.next_branch = self.next_branch.max(index.saturating_add(1));
    }

    /// Drop `child` from the children mapping, keeping other indices intact.
    pub(crate) fn forget_child(&mut self, child: &FrameId) -> Option<u32> {
        let index = self.branch_of(child)?;
        self.children.remove(&index);
        Some(index)
    }

    /// Branch index under which `child` is registered.
    pub fn branch_of(&self, child: &FrameId) -> Option<u32> {
        self.children
            .iter()
            .find(|(_, id)| *id == child)
            .map(|(index, _)| *index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_indices_are_not_reused() {
        let mut node = FrameNode::root("p".into());
        assert_eq!(node.push_child("a".into()), 0);
        assert_eq!(node.push_child("b".into()), 1);
        assert_eq!(node.forget_child(&"a".into()), Some(0));
        assert_eq!(node.push_child("c".into()), 2);
        assert_eq!(node.branch_of(&"b".into()), Some(1));
        assert_eq!(node.branch_of(&"a".into()), None);
        assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn serialized_node_omits_branch_counter() {
        let mut node = FrameNode::root("p".into());
        node.push_child("a".into());
        node.push_child("b".into());
        node.forget_child(&"a".into());

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["frame_id"], "p");
        assert_eq!(json["children"]["1"], "b");
        assert!(json.get("next_branch").is_none());
    }

    #[test]
    fn stored_index_is_kept_and_counter_moves_past_it() {
        let mut node = FrameNode::root("p".into());
        assert_eq!(node.insert_child_at(3, "a".into()), 3);
        assert_eq!(node.push_child("b".into()), 4);
        // Taken slot falls back to the counter.
        assert_eq!(node.insert_child_at(3, "c".into()), 5);
        node.reserve_branch(1);
        assert_eq!(node.next_branch(), 6);
    }
}
