//! The clip job repository.
//!
//! Jobs live in the `videoJobs` collection. Writes after creation are
//! always additive patches: the update mask carries exactly the fields the
//! caller set plus `updatedAt`, so a progress write from the worker can
//! never erase fields the dispatcher wrote, and vice versa.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use stitch_models::{ClipJob, JobId, JobStatus, Segment};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{
    ArrayValue, Document, FromFirestoreValue, MapValue, StructuredQuery, ToFirestoreValue, Value,
};

/// Collection holding clip job documents.
pub const JOBS_COLLECTION: &str = "videoJobs";

/// An additive partial update to a job document.
///
/// Every setter records both the field value and its mask entry.
/// `into_parts` stamps `updatedAt` so every patch moves the freshness
/// marker.
#[derive(Debug, Default)]
pub struct JobPatch {
    fields: HashMap<String, Value>,
    mask: Vec<String>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self.mask.push(key.to_string());
        self
    }

    pub fn status(self, status: JobStatus) -> Self {
        self.set("status", status.as_str().to_firestore_value())
    }

    pub fn progress(self, percent: u8) -> Self {
        self.set("progress", percent.min(100).to_firestore_value())
    }

    pub fn progress_message(self, message: impl Into<String>) -> Self {
        self.set("progressMessage", message.into().to_firestore_value())
    }

    pub fn error(self, message: impl Into<String>) -> Self {
        self.set("error", message.into().to_firestore_value())
    }

    pub fn suggestions(self, suggestions: Vec<String>) -> Self {
        self.set("suggestions", suggestions.to_firestore_value())
    }

    pub fn final_clip_url(self, url: impl Into<String>) -> Self {
        self.set("finalVideoUrl", url.into().to_firestore_value())
    }

    pub fn final_clip_key(self, key: impl Into<String>) -> Self {
        self.set("finalVideoKey", key.into().to_firestore_value())
    }

    pub fn assets_available(self, ids: Vec<String>) -> Self {
        self.set("videosAlreadyAvailable", ids.to_firestore_value())
    }

    pub fn assets_missing(self, ids: Vec<String>) -> Self {
        self.set("videosNeedingDownload", ids.to_firestore_value())
    }

    pub fn skip_download(self, skip: bool) -> Self {
        self.set("skipDownload", skip.to_firestore_value())
    }

    pub fn acquisition_run_id(self, run_id: impl Into<String>) -> Self {
        self.set("acquisitionRunId", run_id.into().to_firestore_value())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Finalize into (fields, mask), stamping `updatedAt`.
    pub fn into_parts(mut self) -> (HashMap<String, Value>, Vec<String>) {
        self.fields
            .insert("updatedAt".to_string(), Utc::now().to_firestore_value());
        self.mask.push("updatedAt".to_string());
        (self.fields, self.mask)
    }
}

/// Repository for clip job documents.
#[derive(Clone)]
pub struct JobRepository {
    client: FirestoreClient,
}

impl JobRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Create the full job document at submission.
    pub async fn create(&self, job_id: &JobId, job: &ClipJob) -> FirestoreResult<()> {
        let fields = clip_job_to_fields(job);
        self.client
            .create_document(JOBS_COLLECTION, job_id.as_str(), fields)
            .await?;
        info!(job_id = %job_id, "created job document");
        Ok(())
    }

    /// Apply an additive patch.
    pub async fn patch(&self, job_id: &JobId, patch: JobPatch) -> FirestoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let (fields, mask) = patch.into_parts();

        self.client
            .with_retry("patch_job", || {
                let fields = fields.clone();
                let mask = mask.clone();
                async move {
                    self.client
                        .update_document(JOBS_COLLECTION, job_id.as_str(), fields, Some(mask))
                        .await
                }
            })
            .await?;
        Ok(())
    }

    /// Find a job by its acquisition run ID.
    ///
    /// Initial runs use the run ID as the document ID, but a resumed job
    /// keeps its document and records the new run in `acquisitionRunId`, so
    /// the webhook falls back to this query.
    pub async fn find_by_run_id(&self, run_id: &str) -> FirestoreResult<Option<(JobId, ClipJob)>> {
        let query = StructuredQuery::field_equals(
            JOBS_COLLECTION,
            "acquisitionRunId",
            run_id.to_firestore_value(),
            1,
        );

        let docs = self.client.run_query(query).await?;
        match docs.first() {
            Some(doc) => {
                let id = doc.id().ok_or_else(|| {
                    FirestoreError::InvalidResponse("query document without name".to_string())
                })?;
                Ok(Some((JobId::from_string(id), document_to_clip_job(doc)?)))
            }
            None => Ok(None),
        }
    }

    /// Fetch a job document.
    pub async fn get(&self, job_id: &JobId) -> FirestoreResult<Option<ClipJob>> {
        let doc = self
            .client
            .get_document(JOBS_COLLECTION, job_id.as_str())
            .await?;

        match doc {
            Some(d) => Ok(Some(document_to_clip_job(&d)?)),
            None => Ok(None),
        }
    }
}

fn segment_to_value(seg: &Segment) -> Value {
    let mut fields = HashMap::new();
    fields.insert("videoId".to_string(), seg.asset_id.to_firestore_value());
    fields.insert(
        "startTimeSeconds".to_string(),
        seg.start_seconds.to_firestore_value(),
    );
    fields.insert(
        "endTimeSeconds".to_string(),
        seg.end_seconds.to_firestore_value(),
    );
    Value::MapValue(MapValue {
        fields: Some(fields),
    })
}

fn value_to_segment(value: &Value) -> Option<Segment> {
    let Value::MapValue(map) = value else {
        return None;
    };
    let fields = map.fields.as_ref()?;
    Some(Segment {
        asset_id: String::from_firestore_value(fields.get("videoId")?)?,
        start_seconds: f64::from_firestore_value(fields.get("startTimeSeconds")?)?,
        end_seconds: f64::from_firestore_value(fields.get("endTimeSeconds")?)?,
    })
}

fn clip_job_to_fields(job: &ClipJob) -> HashMap<String, Value> {
    let mut fields = HashMap::new();

    if let Some(ref session) = job.user_session_id {
        fields.insert("userSessionId".to_string(), session.to_firestore_value());
    }
    fields.insert(
        "status".to_string(),
        job.status.as_str().to_firestore_value(),
    );
    fields.insert(
        "segments".to_string(),
        Value::ArrayValue(ArrayValue {
            values: Some(job.segments.iter().map(segment_to_value).collect()),
        }),
    );
    fields.insert("videoIds".to_string(), job.asset_ids.to_firestore_value());
    fields.insert(
        "totalVideos".to_string(),
        job.total_assets.to_firestore_value(),
    );
    fields.insert(
        "segmentCount".to_string(),
        job.segment_count.to_firestore_value(),
    );
    fields.insert(
        "videosAlreadyAvailable".to_string(),
        job.assets_available.to_firestore_value(),
    );
    fields.insert(
        "videosNeedingDownload".to_string(),
        job.assets_missing.to_firestore_value(),
    );
    fields.insert(
        "skipDownload".to_string(),
        job.skip_download.to_firestore_value(),
    );
    if let Some(ref run_id) = job.acquisition_run_id {
        fields.insert("acquisitionRunId".to_string(), run_id.to_firestore_value());
    }
    fields.insert("progress".to_string(), job.progress.to_firestore_value());
    fields.insert(
        "createdAt".to_string(),
        job.created_at.to_firestore_value(),
    );
    fields.insert(
        "updatedAt".to_string(),
        job.updated_at.to_firestore_value(),
    );

    fields
}

fn document_to_clip_job(doc: &Document) -> FirestoreResult<ClipJob> {
    let get = |name: &str| doc.field(name);

    let status = get("status")
        .and_then(|v| String::from_firestore_value(v))
        .and_then(|s| JobStatus::parse(&s))
        .ok_or_else(|| FirestoreError::InvalidResponse("missing or invalid status".to_string()))?;

    let segments = match get("segments") {
        Some(Value::ArrayValue(arr)) => arr
            .values
            .as_ref()
            .map(|vals| vals.iter().filter_map(value_to_segment).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let string_list = |name: &str| -> Vec<String> {
        get(name)
            .and_then(Vec::<String>::from_firestore_value)
            .unwrap_or_default()
    };

    let now = Utc::now();

    Ok(ClipJob {
        user_session_id: get("userSessionId").and_then(String::from_firestore_value),
        status,
        asset_ids: string_list("videoIds"),
        total_assets: get("totalVideos")
            .and_then(u32::from_firestore_value)
            .unwrap_or_default(),
        segment_count: get("segmentCount")
            .and_then(u32::from_firestore_value)
            .unwrap_or(segments.len() as u32),
        segments,
        assets_available: string_list("videosAlreadyAvailable"),
        assets_missing: string_list("videosNeedingDownload"),
        skip_download: get("skipDownload")
            .and_then(bool::from_firestore_value)
            .unwrap_or(false),
        acquisition_run_id: get("acquisitionRunId").and_then(String::from_firestore_value),
        progress: get("progress")
            .and_then(u8::from_firestore_value)
            .unwrap_or(0),
        progress_message: get("progressMessage").and_then(String::from_firestore_value),
        error: get("error").and_then(String::from_firestore_value),
        suggestions: string_list("suggestions"),
        final_clip_url: get("finalVideoUrl").and_then(String::from_firestore_value),
        final_clip_key: get("finalVideoKey").and_then(String::from_firestore_value),
        created_at: get("createdAt")
            .and_then(FromFirestoreValue::from_firestore_value)
            .unwrap_or(now),
        updated_at: get("updatedAt")
            .and_then(FromFirestoreValue::from_firestore_value)
            .unwrap_or(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_mask_contains_only_set_fields() {
        let patch = JobPatch::new()
            .status(JobStatus::Processing)
            .progress(55)
            .progress_message("Analyzing segments");
        let (fields, mask) = patch.into_parts();

        assert_eq!(mask.len(), 4); // three fields + updatedAt
        assert!(mask.contains(&"status".to_string()));
        assert!(mask.contains(&"progress".to_string()));
        assert!(mask.contains(&"progressMessage".to_string()));
        assert!(mask.contains(&"updatedAt".to_string()));
        assert!(!mask.contains(&"error".to_string()));
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn test_terminal_success_patch_omits_error_fields() {
        let patch = JobPatch::new()
            .status(JobStatus::Complete)
            .progress(100)
            .final_clip_url("https://example.com/clip.mp4");
        let (fields, _) = patch.into_parts();
        assert!(!fields.contains_key("error"));
        assert!(!fields.contains_key("suggestions"));
    }

    #[test]
    fn test_progress_clamps_to_100() {
        let (fields, _) = JobPatch::new().progress(150).into_parts();
        match fields.get("progress") {
            Some(Value::IntegerValue(s)) => assert_eq!(s, "100"),
            other => panic!("unexpected progress value: {:?}", other),
        }
    }

    #[test]
    fn test_empty_patch() {
        assert!(JobPatch::new().is_empty());
        assert!(!JobPatch::new().progress(1).is_empty());
    }

    #[test]
    fn test_job_document_roundtrip() {
        let job = ClipJob::new(
            Some("sess".to_string()),
            vec![Segment::new("vid1", 1.0, 5.0), Segment::new("vid2", 0.0, 2.5)],
            vec!["vid1".to_string(), "vid2".to_string()],
            vec!["vid1".to_string()],
            vec!["vid2".to_string()],
        );

        let doc = Document::new(clip_job_to_fields(&job));
        let back = document_to_clip_job(&doc).unwrap();

        assert_eq!(back.status, job.status);
        assert_eq!(back.segments, job.segments);
        assert_eq!(back.asset_ids, job.asset_ids);
        assert_eq!(back.assets_missing, job.assets_missing);
        assert_eq!(back.skip_download, job.skip_download);
        assert_eq!(back.user_session_id, job.user_session_id);
    }

    #[test]
    fn test_segment_value_conversion() {
        let seg = Segment::new("abc", 12.5, 30.0);
        let back = value_to_segment(&segment_to_value(&seg)).unwrap();
        assert_eq!(back, seg);
    }
}
