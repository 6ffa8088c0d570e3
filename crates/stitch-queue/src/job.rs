//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stitch_models::{JobId, Segment};

/// Job to cut and combine the requested segments for a clip job.
///
/// Carries the full segment list so the worker does not depend on a
/// document read to start cutting. The job document remains the source
/// of truth for status and progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSegmentsJob {
    /// Job document ID
    pub job_id: JobId,
    /// Optional client session identifier, for logging
    pub user_session_id: Option<String>,
    /// Segments in submission order
    pub segments: Vec<Segment>,
    /// Distinct source asset IDs, first-appearance order
    pub asset_ids: Vec<String>,
    /// When the job was enqueued
    pub created_at: DateTime<Utc>,
}

impl ProcessSegmentsJob {
    pub fn new(
        job_id: JobId,
        user_session_id: Option<String>,
        segments: Vec<Segment>,
        asset_ids: Vec<String>,
    ) -> Self {
        Self {
            job_id,
            user_session_id,
            segments,
            asset_ids,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    ///
    /// Keyed by job ID only: a resumed job clears its dedup key first, so
    /// the same document can be re-enqueued after a failure.
    pub fn idempotency_key(&self) -> String {
        format!("process_segments:{}", self.job_id)
    }
}

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    /// Cut, combine, and upload the segments of a clip job
    ProcessSegments(ProcessSegmentsJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::ProcessSegments(j) => &j.job_id,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::ProcessSegments(j) => j.idempotency_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_job_serde_roundtrip() {
        let job = ProcessSegmentsJob::new(
            JobId::new(),
            Some("sess_1".to_string()),
            vec![Segment::new("vid1", 0.0, 10.0)],
            vec!["vid1".to_string()],
        );

        let wrapper = QueueJob::ProcessSegments(job.clone());
        let json = serde_json::to_string(&wrapper).expect("serialize QueueJob");
        assert!(json.contains("\"type\":\"process_segments\""));
        let decoded: QueueJob = serde_json::from_str(&json).expect("deserialize QueueJob");

        match decoded {
            QueueJob::ProcessSegments(j) => {
                assert_eq!(j.job_id, job.job_id);
                assert_eq!(j.segments, job.segments);
                assert_eq!(j.asset_ids, job.asset_ids);
                assert_eq!(j.created_at, job.created_at);
            }
        }
    }

    #[test]
    fn idempotency_key_depends_only_on_job_id() {
        let id = JobId::new();
        let a = ProcessSegmentsJob::new(id.clone(), None, Vec::new(), Vec::new());
        let b = ProcessSegmentsJob::new(
            id,
            Some("sess".to_string()),
            vec![Segment::new("x", 0.0, 1.0)],
            vec!["x".to_string()],
        );
        assert_eq!(a.idempotency_key(), b.idempotency_key());
    }
}
