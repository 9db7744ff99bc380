//! The job poller.
//!
//! Every tick scans the board for pending connectors and asks the backend
//! how each job is doing. Finished jobs get their clip attached, failed jobs
//! are marked and left visible, and a job whose status cannot be fetched at
//! all is torn down together with its target frame.

use std::sync::Arc;
use std::time::Duration;

use flowboard_board_model::diagram::{
    ConnectorRecord, ConnectorUpdate, Diagram, FrameUpdate, StillExtractor,
};
use flowboard_board_model::edge::{ClipReference, EdgeState};
use flowboard_board_model::ids::{ConnectorId, FrameId};
use flowboard_common::cancel::CancelFlag;
use flowboard_common::clock::{elapsed_whole_secs, now_millis};
use flowboard_common::config::PollerConfig;
use flowboard_common::error::FlowboardResult;
use flowboard_frame_graph::{PendingGeneration, Storyboard};
use tokio::time::MissedTickBehavior;

use crate::backend::{JobBackend, JobRequest, JobStatus};

/// Name given to a target frame once its clip is ready.
pub const GENERATED_FRAME_NAME: &str = "Generated Frame";

/// One-shot, user-facing outcome of a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PollNotice {
    /// The job's status could not be fetched; the connector and its target
    /// frame were removed.
    TransportFailure {
        connector: ConnectorId,
        frame: Option<FrameId>,
        job_id: String,
        message: String,
    },

    /// The backend reported the job as failed; the connector is kept.
    JobFailed {
        connector: ConnectorId,
        job_id: String,
        message: Option<String>,
    },

    /// The clip is ready and attached to the connector.
    ClipReady {
        connector: ConnectorId,
        frame: Option<FrameId>,
        video_url: String,
    },
}

impl PollNotice {
    /// Text suitable for a toast or a CLI line.
    pub fn message(&self) -> String {
        match self {
            Self::TransportFailure { job_id, message, .. } => {
                format!("Failed to check video generation status for job {job_id}: {message}")
            }
            Self::JobFailed {
                job_id,
                message: Some(message),
                ..
            } => format!("Video generation failed for job {job_id}: {message}"),
            Self::JobFailed { job_id, .. } => format!("Video generation failed for job {job_id}"),
            Self::ClipReady { video_url, .. } => format!("Video ready: {video_url}"),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollSummary {
    /// Pending connectors examined.
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    /// Connector/frame pairs torn down after a transport failure.
    pub removed: usize,
    /// Connectors left pending (including jobs the backend did not know).
    pub still_pending: usize,
    /// Timer values rewritten.
    pub timer_updates: usize,
    pub notices: Vec<PollNotice>,
    /// The poller stopped during this tick.
    pub halted: bool,
}

/// Totals over a polling run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollReport {
    pub ticks: u64,
    pub completed: usize,
    pub failed: usize,
    pub removed: usize,
    pub notices: Vec<PollNotice>,
    pub halted: bool,
    pub cancelled: bool,
}

impl PollReport {
    fn absorb(&mut self, summary: PollSummary) {
        self.ticks += 1;
        self.completed += summary.completed;
        self.failed += summary.failed;
        self.removed += summary.removed;
        self.notices.extend(summary.notices);
        self.halted |= summary.halted;
    }
}

/// Drives pending generation jobs to a terminal state.
pub struct JobPoller {
    backend: Arc<dyn JobBackend>,
    extractor: Option<Arc<dyn StillExtractor>>,
    config: PollerConfig,
    cancel: CancelFlag,
    halted: bool,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn JobBackend>, config: PollerConfig) -> Self {
        Self {
            backend,
            extractor: None,
            config,
            cancel: CancelFlag::new(),
            halted: false,
        }
    }

    /// Extract a still of each finished clip's last moment.
    pub fn with_still_extractor(mut self, extractor: Arc<dyn StillExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Use an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The flag that stops [`JobPoller::run`].
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether a transport failure has halted polling.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Clear a halt so polling can be started again.
    pub fn resume(&mut self) {
        self.halted = false;
    }

    /// Run one tick against the current wall clock.
    pub async fn tick<D: Diagram>(&mut self, story: &mut Storyboard<D>) -> PollSummary {
        self.tick_at(story, now_millis()).await
    }

    /// Run one tick, computing elapsed timers against `now_ms`.
    pub async fn tick_at<D: Diagram>(
        &mut self,
        story: &mut Storyboard<D>,
        now_ms: i64,
    ) -> PollSummary {
        let mut summary = PollSummary::default();
        if self.halted {
            summary.halted = true;
            return summary;
        }

        for connector in story.diagram().pending_connectors() {
            let EdgeState::Pending {
                job_id,
                started_at_ms,
                timer_secs,
            } = connector.state.clone()
            else {
                continue;
            };
            summary.checked += 1;

            match self.backend.status(&job_id).await {
                Err(e) => {
                    tracing::warn!(
                        connector = %connector.id,
                        job_id = %job_id,
                        backend = self.backend.name(),
                        error = %e,
                        "Failed to fetch job status, discarding generation"
                    );
                    let frame = story.discard_generation(&connector.id);
                    summary.removed += 1;
                    summary.notices.push(PollNotice::TransportFailure {
                        connector: connector.id.clone(),
                        frame,
                        job_id,
                        message: e.to_string(),
                    });
                    if self.config.halt_on_transport_error {
                        self.halted = true;
                        summary.halted = true;
                        tracing::warn!("Job polling halted after transport failure");
                        break;
                    }
                }
                Ok(JobStatus::NotFound) => {
                    tracing::debug!(job_id = %job_id, "Job not known to backend yet");
                    summary.still_pending += 1;
                }
                Ok(JobStatus::Pending) => {
                    let elapsed = elapsed_whole_secs(started_at_ms, now_ms);
                    if elapsed != timer_secs {
                        let next = EdgeState::Pending {
                            job_id: job_id.clone(),
                            started_at_ms,
                            timer_secs: elapsed,
                        };
                        if self.write_state(story, &connector.id, next) {
                            summary.timer_updates += 1;
                        }
                    }
                    summary.still_pending += 1;
                }
                Ok(JobStatus::Done {
                    video_url,
                    duration_secs,
                }) => {
                    let clip = ClipReference {
                        url: video_url.clone(),
                        duration_secs,
                        trim_end: None,
                    };
                    if self.complete(story, &connector, job_id, clip).await {
                        summary.completed += 1;
                        summary.notices.push(PollNotice::ClipReady {
                            connector: connector.id.clone(),
                            frame: connector.end.clone(),
                            video_url,
                        });
                    } else {
                        summary.still_pending += 1;
                    }
                }
                Ok(JobStatus::Error { message }) => {
                    tracing::warn!(
                        connector = %connector.id,
                        job_id = %job_id,
                        "Generation job failed"
                    );
                    let errored = EdgeState::Errored {
                        job_id: job_id.clone(),
                    };
                    if self.write_state(story, &connector.id, errored) {
                        summary.failed += 1;
                        summary.notices.push(PollNotice::JobFailed {
                            connector: connector.id.clone(),
                            job_id,
                            message,
                        });
                    } else {
                        summary.still_pending += 1;
                    }
                }
            }
        }

        for notice in &summary.notices {
            match notice {
                PollNotice::ClipReady { .. } => tracing::info!("{}", notice.message()),
                _ => tracing::warn!("{}", notice.message()),
            }
        }
        summary
    }

    /// Attach the finished clip. Returns false if the board refused the
    /// `Done` state.
    async fn complete<D: Diagram>(
        &self,
        story: &mut Storyboard<D>,
        connector: &ConnectorRecord,
        job_id: String,
        clip: ClipReference,
    ) -> bool {
        let mut last_frame = None;
        if let (Some(extractor), Some(target)) = (&self.extractor, &connector.end) {
            match extractor.extract_last_frame(&clip, target).await {
                Ok(path) => last_frame = Some(path),
                Err(e) => {
                    tracing::warn!(
                        frame = %target,
                        url = %clip.url,
                        error = %e,
                        "Failed to extract last frame"
                    );
                }
            }
        }

        if let Some(target) = &connector.end {
            let update = FrameUpdate {
                name: Some(GENERATED_FRAME_NAME.to_string()),
                still: last_frame.clone(),
            };
            if let Err(e) = story.diagram_mut().update_frame_metadata(target, update) {
                tracing::warn!(frame = %target, error = %e, "Failed to update generated frame");
            }
        }

        tracing::info!(
            connector = %connector.id,
            job_id = %job_id,
            url = %clip.url,
            "Generation job done"
        );
        self.write_state(
            story,
            &connector.id,
            EdgeState::Done {
                job_id,
                clip,
                last_frame,
            },
        )
    }

    fn write_state<D: Diagram>(
        &self,
        story: &mut Storyboard<D>,
        connector: &ConnectorId,
        state: EdgeState,
    ) -> bool {
        match story
            .diagram_mut()
            .update_connector_metadata(connector, ConnectorUpdate::state(state))
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    connector = %connector,
                    error = %e,
                    "Board refused connector update"
                );
                false
            }
        }
    }

    /// Tick at the configured interval until cancelled or halted.
    pub async fn run<D: Diagram>(&mut self, story: &mut Storyboard<D>) -> PollReport {
        self.run_loop(story, false).await
    }

    /// Like [`JobPoller::run`], but also stop once no job is pending.
    pub async fn run_until_idle<D: Diagram>(&mut self, story: &mut Storyboard<D>) -> PollReport {
        self.run_loop(story, true).await
    }

    async fn run_loop<D: Diagram>(
        &mut self,
        story: &mut Storyboard<D>,
        stop_when_idle: bool,
    ) -> PollReport {
        let mut report = PollReport::default();
        let cancel = self.cancel.clone();
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.interval_ms.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            backend = self.backend.name(),
            interval_ms = self.config.interval_ms,
            "Job poller started"
        );

        loop {
            if stop_when_idle && story.diagram().pending_connectors().is_empty() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = interval.tick() => {}
            }
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let summary = self.tick(story).await;
            report.absorb(summary);
            if self.halted {
                break;
            }
        }

        tracing::info!(
            ticks = report.ticks,
            completed = report.completed,
            failed = report.failed,
            removed = report.removed,
            "Job poller stopped"
        );
        report
    }
}

/// Submit a generation job for `source` and create the pending shapes for it.
pub async fn submit_generation<D: Diagram>(
    backend: &dyn JobBackend,
    story: &mut Storyboard<D>,
    source: &FrameId,
    request: JobRequest,
) -> FlowboardResult<PendingGeneration> {
    if story.diagram().frame(source).is_none() {
        return Err(flowboard_common::FlowboardError::validation(format!(
            "Unknown source frame: {source}"
        )));
    }
    let job_id = backend.submit(&request).await?;
    story.request_generation(source, job_id, now_millis(), Some(request.prompt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StubJobBackend;
    use flowboard_board_model::board::Board;
    use flowboard_board_model::diagram::FrameRecord;

    fn story() -> Storyboard<Board> {
        let mut board = Board::new("poll");
        board
            .create_frame(FrameRecord::new("root".into(), "Root"))
            .unwrap();
        Storyboard::new(board)
    }

    fn poller(backend: Arc<StubJobBackend>) -> JobPoller {
        JobPoller::new(backend, PollerConfig::default())
    }

    #[tokio::test]
    async fn done_job_attaches_clip_and_renames_frame() {
        let backend = Arc::new(StubJobBackend::new());
        backend.push_status(
            "j1",
            JobStatus::Done {
                video_url: "https://cdn/a.mp4".into(),
                duration_secs: Some(5.0),
            },
        );
        let mut story = story();
        let pending = story.request_generation(&"root".into(), "j1", 0, None).unwrap();

        let summary = poller(backend).tick_at(&mut story, 1_000).await;
        assert_eq!(summary.completed, 1);

        let connector = story.diagram().connector(&pending.connector_id).unwrap();
        let clip = connector.state.clip().unwrap();
        assert_eq!(clip.url, "https://cdn/a.mp4");
        assert_eq!(clip.duration_secs, Some(5.0));
        assert_eq!(
            story.diagram().frame(&pending.target_id).unwrap().name,
            GENERATED_FRAME_NAME
        );
    }

    #[tokio::test]
    async fn error_job_is_marked_and_kept() {
        let backend = Arc::new(StubJobBackend::new());
        backend.push_status("j1", JobStatus::Error { message: None });
        let mut story = story();
        let pending = story.request_generation(&"root".into(), "j1", 0, None).unwrap();
        let mut poller = poller(backend.clone());

        let summary = poller.tick_at(&mut story, 0).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(
            story.diagram().connector(&pending.connector_id).unwrap().state,
            EdgeState::Errored { job_id: "j1".into() }
        );
        assert!(story.diagram().frame(&pending.target_id).is_some());

        // Never polled again.
        poller.tick_at(&mut story, 0).await;
        assert_eq!(backend.status_calls(), ["j1"]);
    }

    #[tokio::test]
    async fn not_found_leaves_state_untouched() {
        let backend = Arc::new(StubJobBackend::new());
        let mut story = story();
        let pending = story.request_generation(&"root".into(), "ghost", 0, None).unwrap();

        let summary = poller(backend).tick_at(&mut story, 9_000).await;
        assert_eq!(summary.still_pending, 1);
        assert_eq!(
            story.diagram().connector(&pending.connector_id).unwrap().state,
            EdgeState::pending("ghost", 0)
        );
    }

    #[tokio::test]
    async fn transport_failure_removes_one_pair_and_halts() {
        let backend = Arc::new(StubJobBackend::new());
        backend.push_failure("j1", "connection refused");
        backend.push_status("j2", JobStatus::Pending);
        let mut story = story();
        let first = story.request_generation(&"root".into(), "j1", 0, None).unwrap();
        let second = story.request_generation(&"root".into(), "j2", 0, None).unwrap();
        let mut poller = poller(backend.clone());

        let summary = poller.tick_at(&mut story, 0).await;
        assert!(summary.halted);
        assert_eq!(summary.removed, 1);
        assert!(matches!(
            summary.notices.as_slice(),
            [PollNotice::TransportFailure { .. }]
        ));
        assert!(story.diagram().connector(&first.connector_id).is_none());
        assert!(story.diagram().frame(&first.target_id).is_none());
        assert!(story.diagram().connector(&second.connector_id).is_some());
        assert_eq!(story.descendants_of(&"root".into()), vec![second.target_id]);

        let again = poller.tick_at(&mut story, 0).await;
        assert!(again.halted);
        assert_eq!(again.checked, 0);
        assert_eq!(backend.status_calls(), ["j1"]);
    }

    #[tokio::test]
    async fn isolated_failures_keep_polling_other_jobs() {
        let backend = Arc::new(StubJobBackend::new());
        backend.push_failure("j1", "boom");
        backend.push_status("j2", JobStatus::Pending);
        let mut story = story();
        story.request_generation(&"root".into(), "j1", 0, None).unwrap();
        story.request_generation(&"root".into(), "j2", 0, None).unwrap();
        let config = PollerConfig {
            halt_on_transport_error: false,
            ..PollerConfig::default()
        };
        let mut poller = JobPoller::new(backend.clone(), config);

        let summary = poller.tick_at(&mut story, 0).await;
        assert!(!summary.halted);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.still_pending, 1);
        assert_eq!(backend.status_calls(), ["j1", "j2"]);
    }

    #[tokio::test]
    async fn run_until_idle_stops_after_completion() {
        let backend = Arc::new(StubJobBackend::new());
        backend.push_status("j1", JobStatus::Pending).push_status(
            "j1",
            JobStatus::Done {
                video_url: "https://cdn/a.mp4".into(),
                duration_secs: None,
            },
        );
        let mut story = story();
        story.request_generation(&"root".into(), "j1", 0, None).unwrap();
        let config = PollerConfig {
            interval_ms: 5,
            ..PollerConfig::default()
        };
        let mut poller = JobPoller::new(backend, config);

        let report = poller.run_until_idle(&mut story).await;
        assert_eq!(report.ticks, 2);
        assert_eq!(report.completed, 1);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn run_honours_cancellation() {
        let backend = Arc::new(StubJobBackend::new());
        let mut story = story();
        let mut poller = poller(backend);
        poller.stop();

        let report = poller.run(&mut story).await;
        assert!(report.cancelled);
        assert_eq!(report.ticks, 0);
    }

    #[tokio::test]
    async fn submit_creates_pending_pair() {
        let backend = StubJobBackend::new();
        let mut story = story();
        let request = JobRequest {
            prompt: "tilt up".into(),
            global_context: "noir".into(),
            starting_image: None,
        };

        let pending = submit_generation(&backend, &mut story, &"root".into(), request)
            .await
            .unwrap();
        let connector = story.diagram().connector(&pending.connector_id).unwrap();
        assert_eq!(connector.state.job_id(), Some("stub-job-1"));
        assert_eq!(connector.prompt.as_deref(), Some("tilt up"));
        assert_eq!(backend.submitted().len(), 1);

        let err = submit_generation(
            &backend,
            &mut story,
            &"missing".into(),
            JobRequest {
                prompt: "x".into(),
                global_context: String::new(),
                starting_image: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.submitted().len(), 1);
    }
}
