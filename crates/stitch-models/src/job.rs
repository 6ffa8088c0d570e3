//! The clip job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{JobStatus, Segment};

/// Unique identifier for a job.
///
/// Directly submitted jobs get a random UUID. Jobs that are gated on an
/// external acquisition run use the provider's run ID so the completion
/// webhook correlates without a lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A clip job as stored in the job store.
///
/// Field names match the document layout used by the clients, so this type
/// serializes straight into the stored shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipJob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_session_id: Option<String>,

    pub status: JobStatus,

    /// Requested segments, submission order.
    pub segments: Vec<Segment>,

    /// Distinct asset IDs in first-appearance order.
    #[serde(rename = "videoIds")]
    pub asset_ids: Vec<String>,

    #[serde(rename = "totalVideos")]
    pub total_assets: u32,

    pub segment_count: u32,

    /// Assets already present in storage at submission.
    #[serde(rename = "videosAlreadyAvailable", default)]
    pub assets_available: Vec<String>,

    /// Assets handed to the acquisition provider.
    #[serde(rename = "videosNeedingDownload", default)]
    pub assets_missing: Vec<String>,

    /// True when every asset was present and acquisition was skipped.
    #[serde(default)]
    pub skip_download: bool,

    /// Acquisition run ID, when one was triggered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition_run_id: Option<String>,

    #[serde(default)]
    pub progress: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,

    /// User-facing error, only on Failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Remediation hints accompanying an error.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,

    /// Download URL of the finished clip.
    #[serde(rename = "finalVideoUrl", skip_serializing_if = "Option::is_none")]
    pub final_clip_url: Option<String>,

    /// Object key of the finished clip in the output bucket.
    #[serde(rename = "finalVideoKey", skip_serializing_if = "Option::is_none")]
    pub final_clip_key: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClipJob {
    /// Build a fresh job record for the given segments.
    pub fn new(
        user_session_id: Option<String>,
        segments: Vec<Segment>,
        asset_ids: Vec<String>,
        assets_available: Vec<String>,
        assets_missing: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        let skip_download = assets_missing.is_empty();
        Self {
            user_session_id,
            status: if skip_download {
                JobStatus::Queued
            } else {
                JobStatus::Downloading
            },
            segment_count: segments.len() as u32,
            total_assets: asset_ids.len() as u32,
            segments,
            asset_ids,
            assets_available,
            assets_missing,
            skip_download,
            acquisition_run_id: None,
            progress: 0,
            progress_message: None,
            error: None,
            suggestions: Vec::new(),
            final_clip_url: None,
            final_clip_key: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_with_all_assets_present() {
        let segs = vec![Segment::new("a", 0.0, 5.0)];
        let job = ClipJob::new(
            Some("sess1".into()),
            segs,
            vec!["a".into()],
            vec!["a".into()],
            vec![],
        );
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.skip_download);
        assert_eq!(job.segment_count, 1);
        assert_eq!(job.total_assets, 1);
    }

    #[test]
    fn test_new_job_with_missing_assets() {
        let segs = vec![Segment::new("a", 0.0, 5.0), Segment::new("b", 1.0, 2.0)];
        let job = ClipJob::new(
            None,
            segs,
            vec!["a".into(), "b".into()],
            vec!["a".into()],
            vec!["b".into()],
        );
        assert_eq!(job.status, JobStatus::Downloading);
        assert!(!job.skip_download);
    }

    #[test]
    fn test_document_field_names() {
        let job = ClipJob::new(
            None,
            vec![Segment::new("a", 0.0, 5.0)],
            vec!["a".into()],
            vec![],
            vec!["a".into()],
        );
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("videoIds").is_some());
        assert!(json.get("videosNeedingDownload").is_some());
        assert!(json.get("totalVideos").is_some());
        assert!(json.get("segmentCount").is_some());
        assert!(json.get("finalVideoUrl").is_none());
    }
}
