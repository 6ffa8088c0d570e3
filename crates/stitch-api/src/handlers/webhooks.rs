//! Acquisition provider webhooks.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use stitch_firestore::JobPatch;
use stitch_models::{AcquisitionFailureKind, JobId, JobStatus, Milestone};
use stitch_queue::ProcessSegmentsJob;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionWebhook {
    pub run_id: String,
    #[serde(default)]
    pub run_status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionWebhookResponse {
    pub job_id: String,
    pub status: String,
}

/// POST /api/webhooks/acquisition
///
/// Called by the acquisition provider when a download run finishes. On
/// success the job is queued for processing; on failure the provider's
/// error text is classified into a user-facing message.
pub async fn acquisition_webhook(
    State(state): State<AppState>,
    Json(payload): Json<AcquisitionWebhook>,
) -> ApiResult<Json<AcquisitionWebhookResponse>> {
    if payload.run_id.is_empty() {
        return Err(ApiError::bad_request("runId is required"));
    }

    info!(run_id = %payload.run_id, status = ?payload.run_status, "acquisition webhook received");

    // Initial runs use the run ID as the document ID; resumed jobs keep
    // their document and are found by the stored run ID.
    let direct_id = JobId::from_string(payload.run_id.clone());
    let (job_id, job) = match state.jobs.get(&direct_id).await? {
        Some(job) => (direct_id, job),
        None => state
            .jobs
            .find_by_run_id(&payload.run_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Run job not found"))?,
    };

    let succeeded = payload
        .run_status
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("succeeded"))
        .unwrap_or(true);

    if !succeeded {
        if job.status.is_terminal() {
            info!(job_id = %job_id, status = %job.status, "job already settled, ignoring webhook replay");
            return Ok(Json(AcquisitionWebhookResponse {
                job_id: job_id.to_string(),
                status: job.status.as_str().to_string(),
            }));
        }

        let raw = payload.error_message.as_deref().unwrap_or("");
        let kind = AcquisitionFailureKind::classify(raw);
        warn!(job_id = %job_id, kind = ?kind, "acquisition run failed");

        state
            .jobs
            .patch(
                &job_id,
                JobPatch::new()
                    .status(JobStatus::Failed)
                    .error(kind.user_message())
                    .suggestions(kind.suggestions()),
            )
            .await?;

        return Ok(Json(AcquisitionWebhookResponse {
            job_id: job_id.to_string(),
            status: JobStatus::Failed.as_str().to_string(),
        }));
    }

    if !awaiting_acquisition(job.status) {
        info!(job_id = %job_id, status = %job.status, "job not awaiting acquisition, ignoring webhook replay");
        return Ok(Json(AcquisitionWebhookResponse {
            job_id: job_id.to_string(),
            status: job.status.as_str().to_string(),
        }));
    }

    state
        .jobs
        .patch(
            &job_id,
            JobPatch::new()
                .status(JobStatus::Queued)
                .progress(Milestone::AssetsReady.percent())
                .progress_message("Videos downloaded, queueing for segment processing"),
        )
        .await?;

    let work = ProcessSegmentsJob::new(
        job_id.clone(),
        job.user_session_id.clone(),
        job.segments.clone(),
        job.asset_ids.clone(),
    );

    if let Err(e) = state.queue.enqueue_process_segments(work).await {
        if e.is_duplicate() {
            info!(job_id = %job_id, "job already queued, webhook replay ignored");
        } else {
            error!(job_id = %job_id, error = %e, "failed to queue job after download");
            state
                .jobs
                .patch(
                    &job_id,
                    JobPatch::new()
                        .status(JobStatus::Failed)
                        .error("Videos downloaded but queueing for processing failed")
                        .suggestions(vec![
                            "This was a transient messaging issue".to_string(),
                            "Resume the job to try again".to_string(),
                        ]),
                )
                .await?;
            return Err(ApiError::Queue(e));
        }
    }

    info!(job_id = %job_id, "acquisition complete, job queued");

    Ok(Json(AcquisitionWebhookResponse {
        job_id: job_id.to_string(),
        status: JobStatus::Queued.as_str().to_string(),
    }))
}

/// Whether a success callback may advance this job to `Queued`.
///
/// Settled jobs and jobs that already moved past the download stage get a
/// replayed callback answered with their current state instead.
fn awaiting_acquisition(status: JobStatus) -> bool {
    !status.is_terminal() && status.can_transition_to(JobStatus::Queued)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downloading_job_awaits_acquisition() {
        assert!(awaiting_acquisition(JobStatus::Downloading));
    }

    #[test]
    fn test_replays_do_not_advance_settled_or_started_jobs() {
        assert!(!awaiting_acquisition(JobStatus::Complete));
        assert!(!awaiting_acquisition(JobStatus::Failed));
        assert!(!awaiting_acquisition(JobStatus::Processing));
        assert!(!awaiting_acquisition(JobStatus::Queued));
    }
}
