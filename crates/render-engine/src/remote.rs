//! Server-side merge: `POST {base}/api/videos/merge`.

use std::time::Duration;

use flowboard_board_model::edge::ClipReference;
use flowboard_common::config::BackendConfig;
use flowboard_common::error::{FlowboardError, FlowboardResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const MERGE_PATH: &str = "/api/videos/merge";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MergeRequest<'a> {
    video_urls: Vec<&'a str>,
}

/// Both spellings are separate fields so a body carrying both still parses.
#[derive(Debug, Deserialize)]
struct MergeResponse {
    #[serde(default, rename = "mergedVideoUrl")]
    camel: Option<String>,
    #[serde(default, rename = "merged_video_url")]
    snake: Option<String>,
}

impl MergeResponse {
    fn into_url(self) -> FlowboardResult<String> {
        [self.camel, self.snake]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
            .ok_or_else(|| FlowboardError::transport("Merge response carries no video URL"))
    }
}

/// Asks the backend to concatenate clips and returns the merged clip's URL.
///
/// Trim points are not sent; the backend concatenates whole clips.
#[derive(Debug, Clone)]
pub struct HttpMergeBackend {
    client: Client,
    base_url: String,
}

impl HttpMergeBackend {
    pub fn new(config: &BackendConfig) -> FlowboardResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            // The server merges before it responds.
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1) * 10))
            .build()
            .map_err(|e| FlowboardError::transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn merge_url(&self) -> String {
        format!("{}{MERGE_PATH}", self.base_url)
    }

    pub async fn merge(&self, clips: &[ClipReference]) -> FlowboardResult<String> {
        if clips.len() < 2 {
            return Err(FlowboardError::validation(format!(
                "At least 2 videos are required for merging, got {}",
                clips.len()
            )));
        }
        if clips.iter().any(|c| c.trim_end.is_some()) {
            tracing::warn!("Server-side merge ignores trim points");
        }

        let body = MergeRequest {
            video_urls: clips.iter().map(|c| c.url.as_str()).collect(),
        };
        let response = self
            .client
            .post(self.merge_url())
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FlowboardError::transport(format!("Merge request failed: {e}")))?;
        let parsed: MergeResponse = response
            .json()
            .await
            .map_err(|e| FlowboardError::transport(format!("Malformed merge response: {e}")))?;
        let url = parsed.into_url()?;

        tracing::info!(
            url = %url,
            clips = clips.len(),
            "Server-side merge complete"
        );
        Ok(url)
    }
}
