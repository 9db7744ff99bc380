use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use flowboard_board_model::board::Board;
use flowboard_board_model::diagram::{
    ConnectorRecord, ConnectorUpdate, Diagram, DiagramError, FrameDeletionHandler, FrameRecord,
    FrameUpdate, StillExtractor,
};
use flowboard_board_model::edge::{ClipReference, EdgeState};
use flowboard_board_model::ids::{ConnectorId, FrameId};
use flowboard_common::config::PollerConfig;
use flowboard_common::error::{FlowboardError, FlowboardResult};
use flowboard_frame_graph::Storyboard;
use flowboard_job_poller::{JobPoller, JobStatus, StubJobBackend};

/// Board wrapper that counts connector metadata writes.
struct CountingBoard {
    inner: Board,
    connector_writes: Arc<AtomicUsize>,
    refuse_connector_writes: bool,
}

impl Diagram for CountingBoard {
    fn list_frames(&self) -> Vec<FrameRecord> {
        self.inner.list_frames()
    }

    fn list_connectors(&self) -> Vec<ConnectorRecord> {
        self.inner.list_connectors()
    }

    fn frame(&self, id: &FrameId) -> Option<FrameRecord> {
        self.inner.frame(id)
    }

    fn connector(&self, id: &ConnectorId) -> Option<ConnectorRecord> {
        self.inner.connector(id)
    }

    fn on_before_frame_deleted(&mut self, handler: FrameDeletionHandler) {
        self.inner.on_before_frame_deleted(handler)
    }

    fn create_frame(&mut self, frame: FrameRecord) -> Result<(), DiagramError> {
        self.inner.create_frame(frame)
    }

    fn create_connector(&mut self, connector: ConnectorRecord) -> Result<(), DiagramError> {
        self.inner.create_connector(connector)
    }

    fn delete_frame(&mut self, id: &FrameId) -> bool {
        self.inner.delete_frame(id)
    }

    fn delete_connector(&mut self, id: &ConnectorId) -> bool {
        self.inner.delete_connector(id)
    }

    fn update_connector_metadata(
        &mut self,
        id: &ConnectorId,
        update: ConnectorUpdate,
    ) -> Result<(), DiagramError> {
        self.connector_writes.fetch_add(1, Ordering::SeqCst);
        if self.refuse_connector_writes {
            return Err(DiagramError::UnknownConnector(id.clone()));
        }
        self.inner.update_connector_metadata(id, update)
    }

    fn update_frame_metadata(
        &mut self,
        id: &FrameId,
        update: FrameUpdate,
    ) -> Result<(), DiagramError> {
        self.inner.update_frame_metadata(id, update)
    }
}

struct FixedStill;

#[async_trait]
impl StillExtractor for FixedStill {
    async fn extract_last_frame(
        &self,
        _clip: &ClipReference,
        frame: &FrameId,
    ) -> FlowboardResult<PathBuf> {
        Ok(PathBuf::from(format!("/tmp/stills/{}.png", frame.short())))
    }
}

struct BrokenStill;

#[async_trait]
impl StillExtractor for BrokenStill {
    async fn extract_last_frame(
        &self,
        clip: &ClipReference,
        _frame: &FrameId,
    ) -> FlowboardResult<PathBuf> {
        Err(FlowboardError::media(&clip.url, "decoder exploded"))
    }
}

fn counting_story() -> (Storyboard<CountingBoard>, Arc<AtomicUsize>) {
    let mut inner = Board::new("lifecycle");
    inner
        .create_frame(FrameRecord::new("root".into(), "Root"))
        .unwrap();
    let writes = Arc::new(AtomicUsize::new(0));
    let board = CountingBoard {
        inner,
        connector_writes: writes.clone(),
        refuse_connector_writes: false,
    };
    (Storyboard::new(board), writes)
}

fn done(url: &str) -> JobStatus {
    JobStatus::Done {
        video_url: url.to_string(),
        duration_secs: Some(4.0),
    }
}

#[tokio::test]
async fn timer_is_written_only_when_whole_seconds_change() {
    let backend = Arc::new(StubJobBackend::new());
    backend.push_status("j1", JobStatus::Pending);
    let (mut story, writes) = counting_story();
    let pending = story
        .request_generation(&"root".into(), "j1", 10_000, None)
        .unwrap();
    let mut poller = JobPoller::new(backend, PollerConfig::default());

    // 0.4 s elapsed: still 0 whole seconds.
    let summary = poller.tick_at(&mut story, 10_400).await;
    assert_eq!(summary.timer_updates, 0);
    assert_eq!(writes.load(Ordering::SeqCst), 0);

    poller.tick_at(&mut story, 11_200).await;
    poller.tick_at(&mut story, 11_900).await;
    assert_eq!(writes.load(Ordering::SeqCst), 1);

    poller.tick_at(&mut story, 13_050).await;
    assert_eq!(writes.load(Ordering::SeqCst), 2);

    match story.diagram().connector(&pending.connector_id).unwrap().state {
        EdgeState::Pending { timer_secs, .. } => assert_eq!(timer_secs, 3),
        other => panic!("unexpected state {other:?}"),
    }
}

#[tokio::test]
async fn done_never_reverts() {
    let backend = Arc::new(StubJobBackend::new());
    backend
        .push_status("j1", done("https://cdn/a.mp4"))
        .push_status("j1", JobStatus::Pending);
    let (mut story, _) = counting_story();
    let pending = story
        .request_generation(&"root".into(), "j1", 0, None)
        .unwrap();
    let mut poller = JobPoller::new(backend.clone(), PollerConfig::default());

    poller.tick_at(&mut story, 0).await;
    let second = poller.tick_at(&mut story, 5_000).await;

    assert_eq!(second.checked, 0);
    assert_eq!(backend.status_calls(), ["j1"]);
    assert!(story
        .diagram()
        .connector(&pending.connector_id)
        .unwrap()
        .state
        .is_terminal());
}

#[tokio::test]
async fn still_is_attached_to_frame_and_connector() {
    let backend = Arc::new(StubJobBackend::new());
    backend.push_status("j1", done("https://cdn/a.mp4"));
    let (mut story, _) = counting_story();
    let pending = story
        .request_generation(&"root".into(), "j1", 0, None)
        .unwrap();
    let mut poller =
        JobPoller::new(backend, PollerConfig::default()).with_still_extractor(Arc::new(FixedStill));

    poller.tick_at(&mut story, 0).await;

    let frame = story.diagram().frame(&pending.target_id).unwrap();
    let still = frame.still.expect("still should be stored on the frame");
    match story.diagram().connector(&pending.connector_id).unwrap().state {
        EdgeState::Done { last_frame, .. } => assert_eq!(last_frame, Some(still)),
        other => panic!("unexpected state {other:?}"),
    }
}

#[tokio::test]
async fn still_failure_does_not_block_completion() {
    let backend = Arc::new(StubJobBackend::new());
    backend.push_status("j1", done("https://cdn/a.mp4"));
    let (mut story, _) = counting_story();
    let pending = story
        .request_generation(&"root".into(), "j1", 0, None)
        .unwrap();
    let mut poller = JobPoller::new(backend, PollerConfig::default())
        .with_still_extractor(Arc::new(BrokenStill));

    let summary = poller.tick_at(&mut story, 0).await;

    assert_eq!(summary.completed, 1);
    let state = story
        .diagram()
        .connector(&pending.connector_id)
        .unwrap()
        .state;
    assert_eq!(state.clip().map(|c| c.url.as_str()), Some("https://cdn/a.mp4"));
    assert!(story.diagram().frame(&pending.target_id).unwrap().still.is_none());
}

#[tokio::test]
async fn transport_failure_prunes_graph_subtree() {
    let backend = Arc::new(StubJobBackend::new());
    backend.push_failure("j1", "503 upstream");
    let (mut story, _) = counting_story();
    let pending = story
        .request_generation(&"root".into(), "j1", 0, None)
        .unwrap();

    let mut poller = JobPoller::new(backend, PollerConfig::default());
    let summary = poller.tick_at(&mut story, 0).await;

    assert!(summary.halted);
    assert!(poller.is_halted());
    assert!(story.path_to_root(&pending.target_id).is_empty());
    assert_eq!(story.leaf_frames(), vec![FrameId::new("root")]);

    poller.resume();
    assert!(!poller.is_halted());
}

#[tokio::test]
async fn refused_state_write_is_not_reported_as_done() {
    let backend = Arc::new(StubJobBackend::new());
    backend.push_status("j1", done("https://cdn/a.mp4"));
    backend.push_status("j2", JobStatus::Error {
        message: Some("out of credits".into()),
    });
    let (mut story, writes) = counting_story();
    let first = story
        .request_generation(&"root".into(), "j1", 0, None)
        .unwrap();
    let second = story
        .request_generation(&"root".into(), "j2", 0, None)
        .unwrap();
    story.diagram_mut().refuse_connector_writes = true;
    let mut poller = JobPoller::new(backend, PollerConfig::default());

    let summary = poller.tick_at(&mut story, 0).await;

    assert_eq!(writes.load(Ordering::SeqCst), 2);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.still_pending, 2);
    assert!(summary.notices.is_empty());
    for pending in [&first, &second] {
        assert!(story
            .diagram()
            .connector(&pending.connector_id)
            .unwrap()
            .state
            .is_pending());
    }
}
