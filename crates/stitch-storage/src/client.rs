//! S3-compatible storage client.

use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for the storage client.
///
/// Source assets (full episodes) and finished clips live in separate
/// buckets on the same endpoint.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket holding acquired source assets
    pub source_bucket: String,
    /// Bucket receiving finished clips
    pub output_bucket: String,
    /// Region ("auto" for R2-style endpoints)
    pub region: String,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("STORAGE_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("STORAGE_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("STORAGE_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("STORAGE_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("STORAGE_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("STORAGE_SECRET_ACCESS_KEY not set"))?,
            source_bucket: std::env::var("SOURCE_BUCKET")
                .unwrap_or_else(|_| "jre-all-episodes".to_string()),
            output_bucket: std::env::var("OUTPUT_BUCKET")
                .unwrap_or_else(|_| "jre-processed-clips-bucker".to_string()),
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// S3-compatible storage client over the source and output buckets.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    endpoint_url: String,
    source_bucket: String,
    output_bucket: String,
}

impl StorageClient {
    /// Create a new client from configuration.
    pub fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "clipstitch",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            endpoint_url: config.endpoint_url,
            source_bucket: config.source_bucket,
            output_bucket: config.output_bucket,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(StorageConfig::from_env()?))
    }

    pub fn source_bucket(&self) -> &str {
        &self.source_bucket
    }

    pub fn output_bucket(&self) -> &str {
        &self.output_bucket
    }

    /// List every object in the source bucket.
    ///
    /// Follows continuation tokens, so one call sees the whole bucket
    /// regardless of page size.
    pub async fn list_source_objects(&self) -> StorageResult<Vec<ObjectInfo>> {
        debug!(bucket = %self.source_bucket, "listing source objects");

        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.source_bucket);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?;

            if let Some(ref contents) = response.contents {
                for obj in contents {
                    objects.push(ObjectInfo {
                        key: obj.key.clone().unwrap_or_default(),
                        size: obj.size.unwrap_or(0) as u64,
                    });
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        debug!(count = objects.len(), "listed source objects");
        Ok(objects)
    }

    /// Download a source object to a local file, streaming chunk by chunk.
    ///
    /// Source assets run to hours of footage, so the body is never held in
    /// memory whole.
    pub async fn download_source(&self, key: &str, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        debug!(key, dest = %path.display(), "downloading source object");

        let response = self
            .client
            .get_object()
            .bucket(&self.source_bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut body = response.body;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!(key, dest = %path.display(), "downloaded source object");
        Ok(())
    }

    /// Upload a finished clip to the output bucket.
    pub async fn upload_clip(&self, path: impl AsRef<Path>, key: &str) -> StorageResult<()> {
        let path = path.as_ref();
        debug!(key, src = %path.display(), "uploading clip");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.output_bucket)
            .key(key)
            .body(body)
            .content_type("video/mp4")
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!(key, "uploaded clip");
        Ok(())
    }

    /// Presigned GET URL for an object in the output bucket.
    pub async fn presign_clip(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.presign(&self.output_bucket, key, expires_in).await
    }

    /// Presigned GET URL for an object in the source bucket.
    pub async fn presign_source(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.presign(&self.source_bucket, key, expires_in).await
    }

    async fn presign(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Plain object URL in the output bucket, used when presigning fails.
    pub fn clip_object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint_url.trim_end_matches('/'),
            self.output_bucket,
            key
        )
    }

}

/// Information about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> StorageConfig {
        StorageConfig {
            endpoint_url: "https://storage.example.com".to_string(),
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            source_bucket: "sources".to_string(),
            output_bucket: "clips".to_string(),
            region: "auto".to_string(),
        }
    }

    #[test]
    fn test_clip_object_url() {
        let client = StorageClient::new(test_config());
        assert_eq!(
            client.clip_object_url("edited-clips/j1/final_clip.mp4"),
            "https://storage.example.com/clips/edited-clips/j1/final_clip.mp4"
        );
    }
}
