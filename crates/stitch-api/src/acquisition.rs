//! Client for the external asset acquisition provider.
//!
//! Missing assets are handed to a hosted actor run that downloads them into
//! the source bucket and calls our webhook when it finishes. The run is
//! opaque to us: we start it, remember its run ID, and wait for the
//! callback.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};

/// Acquisition provider configuration.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Provider API base URL
    pub base_url: String,
    /// Actor to run for downloads
    pub actor_id: String,
    /// API token
    pub token: String,
    /// Bucket the actor uploads into
    pub target_bucket: String,
    /// Service account JSON handed to the actor for bucket writes
    pub storage_key: Option<String>,
}

impl AcquisitionConfig {
    /// Create config from environment variables.
    ///
    /// Returns `None` when the provider is not configured; submission of
    /// jobs with missing assets then fails with a 500 instead of a panic.
    pub fn from_env() -> Option<Self> {
        let actor_id = std::env::var("ACQUISITION_ACTOR_ID").ok()?;
        let token = std::env::var("ACQUISITION_TOKEN").ok()?;

        Some(Self {
            base_url: std::env::var("ACQUISITION_API_BASE")
                .unwrap_or_else(|_| "https://api.apify.com/v2".to_string()),
            actor_id,
            token,
            target_bucket: std::env::var("SOURCE_BUCKET")
                .unwrap_or_else(|_| "jre-all-episodes".to_string()),
            storage_key: std::env::var("ACQUISITION_STORAGE_KEY").ok(),
        })
    }
}

#[derive(Deserialize)]
struct RunEnvelope {
    data: RunInfo,
}

#[derive(Deserialize)]
struct RunInfo {
    id: String,
}

/// HTTP client for starting acquisition runs.
#[derive(Clone)]
pub struct AcquisitionClient {
    http: reqwest::Client,
    config: AcquisitionConfig,
}

impl AcquisitionClient {
    pub fn new(config: AcquisitionConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::internal(format!("acquisition client init: {}", e)))?;
        Ok(Self { http, config })
    }

    /// Start a download run for the given asset IDs.
    ///
    /// Returns the provider run ID, which becomes the job ID so the
    /// completion webhook correlates without a lookup table.
    pub async fn start_run(&self, asset_ids: &[String]) -> ApiResult<String> {
        let videos: Vec<serde_json::Value> = asset_ids
            .iter()
            .map(|id| {
                json!({
                    "url": format!("https://www.youtube.com/watch?v={}", id),
                    "method": "GET",
                })
            })
            .collect();

        let mut input = json!({
            "videos": videos,
            "preferredFormat": "mp4",
            "preferredQuality": "480p",
            "filenameTemplateParts": ["title"],
            "googleCloudBucketName": self.config.target_bucket,
        });
        if let Some(ref key) = self.config.storage_key {
            input["googleCloudServiceKey"] = json!(key);
        }

        let url = format!(
            "{}/acts/{}/runs?token={}",
            self.config.base_url, self.config.actor_id, self.config.token
        );

        let response = self
            .http
            .post(&url)
            .json(&input)
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("acquisition run request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::internal(format!(
                "acquisition provider returned {}: {}",
                status, body
            )));
        }

        let envelope: RunEnvelope = response
            .json()
            .await
            .map_err(|e| ApiError::internal(format!("acquisition run response: {}", e)))?;

        info!(
            run_id = %envelope.data.id,
            assets = asset_ids.len(),
            "started acquisition run"
        );

        Ok(envelope.data.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> AcquisitionConfig {
        AcquisitionConfig {
            base_url,
            actor_id: "actor123".to_string(),
            token: "tok".to_string(),
            target_bucket: "bucket".to_string(),
            storage_key: None,
        }
    }

    #[tokio::test]
    async fn test_start_run_returns_run_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/acts/actor123/runs"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "run_42"}})),
            )
            .mount(&server)
            .await;

        let client = AcquisitionClient::new(test_config(server.uri())).unwrap();
        let run_id = client.start_run(&["vid1".to_string()]).await.unwrap();
        assert_eq!(run_id, "run_42");
    }

    #[tokio::test]
    async fn test_start_run_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = AcquisitionClient::new(test_config(server.uri())).unwrap();
        let result = client.start_run(&["vid1".to_string()]).await;
        assert!(result.is_err());
    }
}
