//! Flowboard Job Poller
//!
//! Submits video generation jobs and drives them to completion. Each
//! pending connector on the board carries a job id; the poller asks a
//! pluggable backend for the job's status on a fixed interval:
//!
//! - **HTTP:** The generation service (`/api/jobs/video`)
//! - **Stub:** Scripted answers for tests and dry runs
//!
//! Results are written back to the board through the storyboard, so the
//! frame graph follows any frame the poller removes.

pub mod backend;
pub mod http;
pub mod poller;

pub use backend::{JobBackend, JobRequest, JobStatus, StubJobBackend};
pub use http::HttpJobBackend;
pub use poller::{
    submit_generation, JobPoller, PollNotice, PollReport, PollSummary, GENERATED_FRAME_NAME,
};
