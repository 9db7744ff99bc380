//! HTTP generation backend.
//!
//! - `POST {base}/api/jobs/video` starts a job and answers `{ "job_id" }`
//! - `GET {base}/api/jobs/video/{job_id}` answers
//!   `{ "status", "video_url"?, "duration_seconds"? }`

use std::time::Duration;

use async_trait::async_trait;
use flowboard_common::config::BackendConfig;
use flowboard_common::error::{FlowboardError, FlowboardResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::backend::{JobBackend, JobRequest, JobStatus};

const JOBS_PATH: &str = "/api/jobs/video";

/// Generation backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpJobBackend {
    client: Client,
    base_url: String,
}

impl HttpJobBackend {
    pub fn new(config: &BackendConfig) -> FlowboardResult<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn jobs_url(&self) -> String {
        format!("{}{JOBS_PATH}", self.base_url)
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}{JOBS_PATH}/{job_id}", self.base_url)
    }
}

/// Submit body. Each spelling is its own field so a body carrying both
/// still parses; snake case wins.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default, rename = "jobId")]
    job_id_camel: Option<String>,
}

impl SubmitResponse {
    fn into_job_id(self) -> FlowboardResult<String> {
        first_present([self.job_id, self.job_id_camel])
            .ok_or_else(|| FlowboardError::transport("Submit response carries no job id"))
    }
}

/// Status body. Backends disagree on key casing, so the common spellings are
/// all accepted, and the first non-empty one is used.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default, rename = "videoUrl")]
    video_url_camel: Option<String>,
    #[serde(default, rename = "videoURL")]
    video_url_upper: Option<String>,
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default, rename = "durationSeconds")]
    duration_seconds_camel: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

fn first_present<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
}

impl StatusResponse {
    fn into_status(self) -> JobStatus {
        let video_url =
            first_present([self.video_url, self.video_url_camel, self.video_url_upper]);
        let duration_secs = self.duration_seconds.or(self.duration_seconds_camel);
        match self.status.to_ascii_lowercase().as_str() {
            "done" => match video_url {
                Some(video_url) => JobStatus::Done {
                    video_url,
                    duration_secs,
                },
                None => JobStatus::Pending,
            },
            "error" => JobStatus::Error {
                message: self.error,
            },
            // "pending", "waiting", "processing", ...
            _ => JobStatus::Pending,
        }
    }
}

#[async_trait]
impl JobBackend for HttpJobBackend {
    async fn submit(&self, request: &JobRequest) -> FlowboardResult<String> {
        let response = self
            .client
            .post(self.jobs_url())
            .json(request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(map_http_error)?;

        let body: SubmitResponse = response.json().await.map_err(map_http_error)?;
        let job_id = body.into_job_id()?;
        tracing::info!(job_id = %job_id, "Generation job submitted");
        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> FlowboardResult<JobStatus> {
        let response = self
            .client
            .get(self.job_url(job_id))
            .send()
            .await
            .map_err(map_http_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(JobStatus::NotFound);
        }
        let response = response.error_for_status().map_err(map_http_error)?;
        let body: StatusResponse = response.json().await.map_err(map_http_error)?;
        Ok(body.into_status())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Map a reqwest failure onto the transport error taxonomy.
pub(crate) fn map_http_error(error: reqwest::Error) -> FlowboardError {
    if let Some(status) = error.status() {
        FlowboardError::transport(format!("Request failed with status {status}: {error}"))
    } else if error.is_timeout() {
        FlowboardError::transport(format!("Request timeout: {error}"))
    } else if error.is_connect() {
        FlowboardError::transport(format!("Connection error: {error}"))
    } else if error.is_decode() {
        FlowboardError::transport(format!("Malformed response body: {error}"))
    } else {
        FlowboardError::transport(format!("HTTP error: {error}"))
    }
}

pub(crate) fn build_http_client(config: &BackendConfig) -> FlowboardResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| FlowboardError::transport(format!("Failed to create HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> JobStatus {
        serde_json::from_str::<StatusResponse>(json)
            .unwrap()
            .into_status()
    }

    #[test]
    fn done_with_url_is_done() {
        assert_eq!(
            parse(r#"{"status":"done","video_url":"https://cdn/x.mp4","duration_seconds":5.0}"#),
            JobStatus::Done {
                video_url: "https://cdn/x.mp4".into(),
                duration_secs: Some(5.0)
            }
        );
    }

    #[test]
    fn camel_case_keys_are_accepted() {
        assert_eq!(
            parse(r#"{"status":"done","videoURL":"u","durationSeconds":2.5}"#),
            JobStatus::Done {
                video_url: "u".into(),
                duration_secs: Some(2.5)
            }
        );
        assert_eq!(
            parse(r#"{"status":"done","videoUrl":"u"}"#),
            JobStatus::Done {
                video_url: "u".into(),
                duration_secs: None
            }
        );
    }

    #[test]
    fn done_without_url_is_still_pending() {
        assert_eq!(parse(r#"{"status":"done"}"#), JobStatus::Pending);
        assert_eq!(parse(r#"{"status":"done","video_url":""}"#), JobStatus::Pending);
    }

    #[test]
    fn waiting_and_unknown_statuses_are_pending() {
        assert_eq!(parse(r#"{"status":"waiting"}"#), JobStatus::Pending);
        assert_eq!(parse(r#"{"status":"processing"}"#), JobStatus::Pending);
    }

    #[test]
    fn error_carries_message() {
        assert_eq!(
            parse(r#"{"status":"error","error":"content policy"}"#),
            JobStatus::Error {
                message: Some("content policy".into())
            }
        );
    }

    #[test]
    fn body_with_both_spellings_parses() {
        assert_eq!(
            parse(
                r#"{"status":"done","video_url":"snake","videoUrl":"camel",
                    "duration_seconds":3.0,"durationSeconds":9.0}"#
            ),
            JobStatus::Done {
                video_url: "snake".into(),
                duration_secs: Some(3.0)
            }
        );
        assert_eq!(
            parse(r#"{"status":"done","video_url":"","videoUrl":"camel"}"#),
            JobStatus::Done {
                video_url: "camel".into(),
                duration_secs: None
            }
        );
    }

    fn job_id(json: &str) -> FlowboardResult<String> {
        serde_json::from_str::<SubmitResponse>(json)
            .unwrap()
            .into_job_id()
    }

    #[test]
    fn submit_response_accepts_both_spellings() {
        assert_eq!(job_id(r#"{"job_id":"a"}"#).unwrap(), "a");
        assert_eq!(job_id(r#"{"jobId":"b"}"#).unwrap(), "b");
        assert_eq!(job_id(r#"{"job_id":"a","jobId":"b"}"#).unwrap(), "a");
        assert!(job_id(r#"{"status":"queued"}"#).is_err());
    }

    #[test]
    fn urls_are_joined_without_double_slash() {
        let config = BackendConfig {
            base_url: "http://localhost:8000/".into(),
            ..BackendConfig::default()
        };
        let backend = HttpJobBackend::new(&config).unwrap();
        assert_eq!(backend.jobs_url(), "http://localhost:8000/api/jobs/video");
        assert_eq!(backend.job_url("j9"), "http://localhost:8000/api/jobs/video/j9");
    }
}
