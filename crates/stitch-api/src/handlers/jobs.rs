//! Job submission, polling, and resume handlers.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stitch_models::{unique_asset_ids, ClipJob, JobId, JobStatus, Milestone, Segment};
use stitch_queue::ProcessSegmentsJob;
use stitch_storage::AssetAvailability;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Source URLs are short-lived; clients fetch them on demand.
const SOURCE_URL_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub user_session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: String,
    pub status: String,
    pub total_videos: u32,
    pub segment_count: u32,
    pub videos_skipped: u32,
    pub videos_downloading: u32,
}

/// POST /api/jobs
///
/// Validates the request, checks which source assets are already in
/// storage, and either queues the job directly or hands the missing
/// assets to the acquisition provider. Returns 201 immediately; clients
/// poll the job for progress.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    if request.segments.is_empty() {
        return Err(ApiError::bad_request("segments must not be empty"));
    }
    if request.segments.iter().any(|s| s.asset_id.is_empty()) {
        return Err(ApiError::bad_request("every segment needs a videoId"));
    }

    let asset_ids = unique_asset_ids(&request.segments);

    let availability = state.availability.check(&asset_ids).await;
    let mut available = Vec::new();
    let mut missing = Vec::new();
    for id in &asset_ids {
        match availability.get(id) {
            Some(AssetAvailability::Available { .. }) => available.push(id.clone()),
            Some(AssetAvailability::CheckFailed { reason }) => {
                // Re-acquiring an asset we may already have is wasteful but
                // safe; losing the job is not.
                warn!(asset_id = %id, reason = %reason, "availability check failed, treating as missing");
                missing.push(id.clone());
            }
            _ => missing.push(id.clone()),
        }
    }

    if missing.is_empty() {
        let job_id = JobId::new();
        let job = ClipJob::new(
            request.user_session_id.clone(),
            request.segments.clone(),
            asset_ids.clone(),
            available,
            Vec::new(),
        );

        state.jobs.create(&job_id, &job).await?;
        state
            .queue
            .enqueue_process_segments(ProcessSegmentsJob::new(
                job_id.clone(),
                request.user_session_id,
                request.segments,
                asset_ids,
            ))
            .await?;

        info!(job_id = %job_id, "job queued, all assets present");

        Ok((
            StatusCode::CREATED,
            Json(SubmitJobResponse {
                job_id: job_id.to_string(),
                status: job.status.as_str().to_string(),
                total_videos: job.total_assets,
                segment_count: job.segment_count,
                videos_skipped: job.assets_available.len() as u32,
                videos_downloading: 0,
            }),
        ))
    } else {
        let acquisition = state
            .acquisition
            .as_ref()
            .ok_or_else(|| ApiError::internal("acquisition provider not configured"))?;

        let run_id = acquisition.start_run(&missing).await?;

        // The run ID doubles as the job ID so the webhook correlates
        // without a lookup.
        let job_id = JobId::from_string(run_id.clone());
        let mut job = ClipJob::new(
            request.user_session_id,
            request.segments,
            asset_ids,
            available,
            missing,
        );
        job.acquisition_run_id = Some(run_id);

        state.jobs.create(&job_id, &job).await?;

        info!(job_id = %job_id, downloading = job.assets_missing.len(), "job created, acquisition started");

        Ok((
            StatusCode::CREATED,
            Json(SubmitJobResponse {
                job_id: job_id.to_string(),
                status: job.status.as_str().to_string(),
                total_videos: job.total_assets,
                segment_count: job.segment_count,
                videos_skipped: job.assets_available.len() as u32,
                videos_downloading: job.assets_missing.len() as u32,
            }),
        ))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_id: String,
    #[serde(flatten)]
    pub job: ClipJob,
}

/// GET /api/jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let id = JobId::from_string(job_id.clone());
    let job = state
        .jobs
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(JobResponse { job_id, job }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeJobResponse {
    pub job_id: String,
    pub status: String,
    pub videos_downloading: u32,
}

/// POST /api/jobs/:job_id/resume
///
/// Re-submits a failed job under the same ID. Availability is checked
/// again: assets acquired since the failure are not re-downloaded.
pub async fn resume_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ResumeJobResponse>> {
    let id = JobId::from_string(job_id.clone());
    let job = state
        .jobs
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if job.status != JobStatus::Failed {
        return Err(ApiError::conflict(format!(
            "only failed jobs can be resumed, job is {}",
            job.status.as_str()
        )));
    }

    let availability = state.availability.check(&job.asset_ids).await;
    let mut available = Vec::new();
    let mut missing = Vec::new();
    for asset_id in &job.asset_ids {
        match availability.get(asset_id) {
            Some(AssetAvailability::Available { .. }) => available.push(asset_id.clone()),
            _ => missing.push(asset_id.clone()),
        }
    }

    // Allow the same document to be enqueued again.
    let work = ProcessSegmentsJob::new(
        id.clone(),
        job.user_session_id.clone(),
        job.segments.clone(),
        job.asset_ids.clone(),
    );
    state.queue.clear_dedup(&work.idempotency_key()).await?;

    if missing.is_empty() {
        state
            .jobs
            .patch(
                &id,
                stitch_firestore::JobPatch::new()
                    .status(JobStatus::Queued)
                    .progress(Milestone::AssetsReady.percent())
                    .progress_message("Resumed, queued for processing")
                    .assets_available(available)
                    .assets_missing(Vec::new())
                    .skip_download(true),
            )
            .await?;
        state.queue.enqueue_process_segments(work).await?;

        info!(job_id = %id, "failed job resumed and re-queued");

        Ok(Json(ResumeJobResponse {
            job_id,
            status: JobStatus::Queued.as_str().to_string(),
            videos_downloading: 0,
        }))
    } else {
        let acquisition = state
            .acquisition
            .as_ref()
            .ok_or_else(|| ApiError::internal("acquisition provider not configured"))?;
        let run_id = acquisition.start_run(&missing).await?;

        state
            .jobs
            .patch(
                &id,
                stitch_firestore::JobPatch::new()
                    .status(JobStatus::Downloading)
                    .progress(Milestone::AcquisitionStarted.percent())
                    .progress_message("Resumed, re-acquiring missing videos")
                    .assets_available(available)
                    .assets_missing(missing.clone())
                    .skip_download(false)
                    .acquisition_run_id(run_id),
            )
            .await?;

        info!(job_id = %id, downloading = missing.len(), "failed job resumed, acquisition restarted");

        Ok(Json(ResumeJobResponse {
            job_id,
            status: JobStatus::Downloading.as_str().to_string(),
            videos_downloading: missing.len() as u32,
        }))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceVideo {
    pub video_id: String,
    pub url: String,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesResponse {
    pub job_id: String,
    pub sources: Vec<SourceVideo>,
}

/// GET /api/jobs/:job_id/sources
///
/// Presigned download URLs for the job's source assets. Assets not (yet)
/// in the bucket are simply absent from the response.
pub async fn get_job_sources(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<SourcesResponse>> {
    let id = JobId::from_string(job_id.clone());
    let job = state
        .jobs
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    let availability = state.availability.check(&job.asset_ids).await;

    let mut sources = Vec::new();
    for asset_id in &job.asset_ids {
        if let Some(AssetAvailability::Available { key }) = availability.get(asset_id) {
            match state.storage.presign_source(key, SOURCE_URL_TTL).await {
                Ok(url) => sources.push(SourceVideo {
                    video_id: asset_id.clone(),
                    url,
                    expires_in_seconds: SOURCE_URL_TTL.as_secs(),
                }),
                Err(e) => {
                    warn!(asset_id = %asset_id, error = %e, "failed to presign source video");
                }
            }
        }
    }

    Ok(Json(SourcesResponse { job_id, sources }))
}
