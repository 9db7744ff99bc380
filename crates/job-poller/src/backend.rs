//! Generation backend abstraction.
//!
//! The poller only needs two calls from a backend: submit a job and ask for
//! its status. [`crate::http::HttpJobBackend`] talks to the real service;
//! [`StubJobBackend`] replays scripted answers for tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use flowboard_common::error::{FlowboardError, FlowboardResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Body of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// What should happen in the next shot.
    pub prompt: String,

    /// Board-wide context shared by every shot.
    #[serde(default)]
    pub global_context: String,

    /// Image the clip should start from (URL or data URI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_image: Option<String>,
}

/// Status of a generation job as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Queued or running.
    Pending,

    /// Finished with a playable clip.
    Done {
        video_url: String,
        duration_secs: Option<f64>,
    },

    /// The backend gave up on the job.
    Error { message: Option<String> },

    /// The backend does not know the job (yet, or any more).
    NotFound,
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::NotFound => "not_found",
        }
    }
}

/// Trait for generation backends.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Start a generation job and return its id.
    async fn submit(&self, request: &JobRequest) -> FlowboardResult<String>;

    /// Current status of `job_id`.
    ///
    /// `Err` means the status could not be obtained at all (network error,
    /// unexpected HTTP status, undecodable body).
    async fn status(&self, job_id: &str) -> FlowboardResult<JobStatus>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Stub backend for testing: answers status queries from per-job scripts.
///
/// Each job has a queue of answers; the last answer repeats once the queue
/// is down to one entry. Unknown jobs report [`JobStatus::NotFound`].
#[derive(Debug, Default)]
pub struct StubJobBackend {
    scripts: Mutex<HashMap<String, VecDeque<StubAnswer>>>,
    submitted: Mutex<Vec<JobRequest>>,
    calls: Mutex<Vec<String>>,
}

#[derive(Debug, Clone)]
enum StubAnswer {
    Status(JobStatus),
    Failure(String),
}

impl StubJobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a status answer for `job_id`.
    pub fn push_status(&self, job_id: &str, status: JobStatus) -> &Self {
        self.push(job_id, StubAnswer::Status(status))
    }

    /// Queue a transport failure for `job_id`.
    pub fn push_failure(&self, job_id: &str, message: &str) -> &Self {
        self.push(job_id, StubAnswer::Failure(message.to_string()))
    }

    fn push(&self, job_id: &str, answer: StubAnswer) -> &Self {
        self.scripts
            .lock()
            .entry(job_id.to_string())
            .or_default()
            .push_back(answer);
        self
    }

    /// Job ids queried so far, in call order.
    pub fn status_calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Requests passed to [`JobBackend::submit`].
    pub fn submitted(&self) -> Vec<JobRequest> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl JobBackend for StubJobBackend {
    async fn submit(&self, request: &JobRequest) -> FlowboardResult<String> {
        let mut submitted = self.submitted.lock();
        submitted.push(request.clone());
        Ok(format!("stub-job-{}", submitted.len()))
    }

    async fn status(&self, job_id: &str) -> FlowboardResult<JobStatus> {
        self.calls.lock().push(job_id.to_string());

        let answer = {
            let mut scripts = self.scripts.lock();
            match scripts.get_mut(job_id) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match answer {
            Some(StubAnswer::Status(status)) => Ok(status),
            Some(StubAnswer::Failure(message)) => Err(FlowboardError::transport(message)),
            None => Ok(JobStatus::NotFound),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}
