//! In-memory diagram with a JSON snapshot format.
//!
//! `Board` stands in for the interactive editor when Flowboard runs from
//! the command line or in tests. It enforces the same rules a real editor
//! adapter must: stable connector order, unbinding of terminals when a
//! frame disappears, and no transitions out of terminal edge states.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagram::{
    ConnectorRecord, ConnectorUpdate, Diagram, DiagramError, FrameDeletionHandler, FrameRecord,
    FrameUpdate,
};
use crate::edge::EdgeState;
use crate::ids::{ConnectorId, FrameId};

/// Serialized board snapshot (`board.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDocument {
    /// Schema version.
    pub version: String,

    /// Human-readable board name.
    pub name: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    #[serde(default)]
    pub frames: Vec<FrameRecord>,

    /// Kept in creation order; graph reconstruction depends on it.
    #[serde(default)]
    pub connectors: Vec<ConnectorRecord>,
}

impl BoardDocument {
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: "1.0".to_string(),
            name: name.into(),
            created_at: now.clone(),
            modified_at: now,
            frames: vec![],
            connectors: vec![],
        }
    }
}

/// A live board: the snapshot plus subscribed deletion hooks.
pub struct Board {
    document: BoardDocument,
    deletion_handlers: Vec<FrameDeletionHandler>,
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("document", &self.document)
            .field("deletion_handlers", &self.deletion_handlers.len())
            .finish()
    }
}

impl Board {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_document(BoardDocument::new(name))
    }

    pub fn from_document(document: BoardDocument) -> Self {
        Self {
            document,
            deletion_handlers: vec![],
        }
    }

    pub fn document(&self) -> &BoardDocument {
        &self.document
    }

    /// Load a board snapshot from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BoardError> {
        let path = path.as_ref().to_path_buf();
        let json = std::fs::read_to_string(&path).map_err(|e| BoardError::IoError {
            path: path.clone(),
            source: e,
        })?;
        let document: BoardDocument =
            serde_json::from_str(&json).map_err(|e| BoardError::ParseError { path, source: e })?;
        Ok(Self::from_document(document))
    }

    /// Write the snapshot to `path`, creating parent directories.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), BoardError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BoardError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        self.document.modified_at = chrono::Utc::now().to_rfc3339();
        let json =
            serde_json::to_string_pretty(&self.document).map_err(|e| BoardError::ParseError {
                path: path.clone(),
                source: e,
            })?;
        std::fs::write(&path, json).map_err(|e| BoardError::IoError { path, source: e })?;
        Ok(())
    }

    fn frame_index(&self, id: &FrameId) -> Option<usize> {
        self.document.frames.iter().position(|f| &f.id == id)
    }

    fn connector_index(&self, id: &ConnectorId) -> Option<usize> {
        self.document.connectors.iter().position(|c| &c.id == id)
    }

    fn id_taken(&self, raw: &str) -> bool {
        self.document.frames.iter().any(|f| f.id.as_str() == raw)
            || self.document.connectors.iter().any(|c| c.id.as_str() == raw)
    }
}

impl Diagram for Board {
    fn list_frames(&self) -> Vec<FrameRecord> {
        self.document.frames.clone()
    }

    fn list_connectors(&self) -> Vec<ConnectorRecord> {
        self.document.connectors.clone()
    }

    fn frame(&self, id: &FrameId) -> Option<FrameRecord> {
        self.frame_index(id).map(|i| self.document.frames[i].clone())
    }

    fn connector(&self, id: &ConnectorId) -> Option<ConnectorRecord> {
        self.connector_index(id)
            .map(|i| self.document.connectors[i].clone())
    }

    fn on_before_frame_deleted(&mut self, handler: FrameDeletionHandler) {
        self.deletion_handlers.push(handler);
    }

    fn create_frame(&mut self, frame: FrameRecord) -> Result<(), DiagramError> {
        if self.id_taken(frame.id.as_str()) {
            return Err(DiagramError::DuplicateId(frame.id.to_string()));
        }
        self.document.frames.push(frame);
        Ok(())
    }

    fn create_connector(&mut self, connector: ConnectorRecord) -> Result<(), DiagramError> {
        if self.id_taken(connector.id.as_str()) {
            return Err(DiagramError::DuplicateId(connector.id.to_string()));
        }
        for terminal in [&connector.start, &connector.end].into_iter().flatten() {
            if self.frame_index(terminal).is_none() {
                return Err(DiagramError::UnknownFrame(terminal.clone()));
            }
        }
        self.document.connectors.push(connector);
        Ok(())
    }

    fn delete_frame(&mut self, id: &FrameId) -> bool {
        let Some(index) = self.frame_index(id) else {
            return false;
        };
        for handler in &mut self.deletion_handlers {
            handler(id);
        }
        self.document.frames.remove(index);
        for connector in &mut self.document.connectors {
            if connector.start.as_ref() == Some(id) {
                connector.start = None;
            }
            if connector.end.as_ref() == Some(id) {
                connector.end = None;
            }
        }
        tracing::debug!(frame = %id, "Frame deleted from board");
        true
    }

    fn delete_connector(&mut self, id: &ConnectorId) -> bool {
        match self.connector_index(id) {
            Some(index) => {
                self.document.connectors.remove(index);
                tracing::debug!(connector = %id, "Connector deleted from board");
                true
            }
            None => false,
        }
    }

    fn update_connector_metadata(
        &mut self,
        id: &ConnectorId,
        update: ConnectorUpdate,
    ) -> Result<(), DiagramError> {
        let index = self
            .connector_index(id)
            .ok_or_else(|| DiagramError::UnknownConnector(id.clone()))?;
        let connector = &mut self.document.connectors[index];

        let mut next = update
            .state
            .unwrap_or_else(|| connector.state.clone());
        if !connector.state.can_transition_to(&next) {
            return Err(DiagramError::IllegalTransition {
                id: id.clone(),
                from: connector.state.label(),
                to: next.label(),
            });
        }
        if let Some(trim_end) = update.trim_end {
            match &mut next {
                EdgeState::Done { clip, .. } => clip.trim_end = trim_end,
                _ => return Err(DiagramError::NotTrimmable { id: id.clone() }),
            }
        }
        connector.state = next;
        Ok(())
    }

    fn update_frame_metadata(
        &mut self,
        id: &FrameId,
        update: FrameUpdate,
    ) -> Result<(), DiagramError> {
        let index = self
            .frame_index(id)
            .ok_or_else(|| DiagramError::UnknownFrame(id.clone()))?;
        let frame = &mut self.document.frames[index];
        if let Some(name) = update.name {
            frame.name = name;
        }
        if let Some(still) = update.still {
            frame.still = Some(still);
        }
        Ok(())
    }
}

/// Errors that can occur when reading or writing board snapshots.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<BoardError> for flowboard_common::FlowboardError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::IoError { source, .. } => flowboard_common::FlowboardError::Io(source),
            BoardError::ParseError { source, .. } => flowboard_common::FlowboardError::Json(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::ClipReference;
    use std::sync::{Arc, Mutex};

    fn board_with_chain() -> Board {
        let mut board = Board::new("Chain");
        for id in ["root", "a"] {
            board
                .create_frame(FrameRecord::new(FrameId::new(id), id))
                .unwrap();
        }
        let mut connector =
            ConnectorRecord::link(ConnectorId::new("arrow-a"), "root".into(), "a".into());
        connector.state = EdgeState::pending("job-1", 0);
        board.create_connector(connector).unwrap();
        board
    }

    #[test]
    fn test_delete_frame_runs_hooks_before_removal_and_unbinds() {
        let mut board = board_with_chain();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        board.on_before_frame_deleted(Box::new(move |id| {
            sink.lock().unwrap().push(id.clone());
        }));

        assert!(board.delete_frame(&FrameId::new("a")));
        assert_eq!(seen.lock().unwrap().as_slice(), &[FrameId::new("a")]);
        assert!(board.frame(&FrameId::new("a")).is_none());

        let connector = board.connector(&ConnectorId::new("arrow-a")).unwrap();
        assert_eq!(connector.start, Some(FrameId::new("root")));
        assert_eq!(connector.end, None);

        assert!(!board.delete_frame(&FrameId::new("a")));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_done_connector_cannot_return_to_pending() {
        let mut board = board_with_chain();
        let id = ConnectorId::new("arrow-a");
        let done = EdgeState::Done {
            job_id: "job-1".into(),
            clip: ClipReference::new("https://cdn/a.mp4").with_duration(4.0),
            last_frame: None,
        };
        board
            .update_connector_metadata(&id, ConnectorUpdate::state(done))
            .unwrap();

        let err = board
            .update_connector_metadata(&id, ConnectorUpdate::state(EdgeState::pending("job-1", 0)))
            .unwrap_err();
        assert!(matches!(err, DiagramError::IllegalTransition { .. }));
    }

    #[test]
    fn test_trim_requires_clip() {
        let mut board = board_with_chain();
        let id = ConnectorId::new("arrow-a");
        assert!(matches!(
            board.update_connector_metadata(&id, ConnectorUpdate::trim_end(Some(1.0))),
            Err(DiagramError::NotTrimmable { .. })
        ));
    }

    #[test]
    fn test_connector_requires_existing_terminals() {
        let mut board = Board::new("Empty");
        let err = board
            .create_connector(ConnectorRecord::link(
                ConnectorId::new("x"),
                "nope".into(),
                "nada".into(),
            ))
            .unwrap_err();
        assert!(matches!(err, DiagramError::UnknownFrame(_)));
    }

    #[test]
    fn test_pending_connectors_filter() {
        let board = board_with_chain();
        assert_eq!(board.pending_connectors().len(), 1);
    }

    #[test]
    fn test_snapshot_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boards").join("board.json");

        let mut board = board_with_chain();
        board.save(&path).unwrap();

        let loaded = Board::load(&path).unwrap();
        assert_eq!(loaded.document().name, "Chain");
        assert_eq!(loaded.list_frames().len(), 2);
        assert_eq!(
            loaded.list_connectors()[0].state,
            EdgeState::pending("job-1", 0)
        );
    }
}
