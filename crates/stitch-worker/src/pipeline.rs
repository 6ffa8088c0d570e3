//! The pipeline coordinator.
//!
//! One execution turns a queued job into a single uploaded clip: group the
//! segments by source asset, download and cut each asset under a wall-clock
//! budget, stitch the per-asset clips together, upload, presign, finalize.
//! A failing asset is skipped, not fatal; only zero usable assets fails the
//! job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info, warn};

use stitch_firestore::{FirestoreClient, JobPatch, JobRepository};
use stitch_media::{combine_clips, extract_asset_clip, ExtractOptions};
use stitch_models::{
    extraction_progress, group_by_asset, AssetSegments, ClipJob, EncodingConfig, JobStatus,
    Milestone,
};
use stitch_queue::ProcessSegmentsJob;
use stitch_storage::{AssetAvailability, AvailabilityIndex, StorageClient};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::suggestions::processing_suggestions;

/// Final clip URLs stay valid for a week.
const CLIP_URL_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Shared clients for pipeline executions, built once at worker start.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub storage: StorageClient,
    pub availability: AvailabilityIndex,
    pub jobs: JobRepository,
    pub encoding: EncodingConfig,
}

impl PipelineContext {
    pub fn new(config: WorkerConfig) -> WorkerResult<Self> {
        let storage = StorageClient::from_env()?;
        let firestore = FirestoreClient::from_env()?;

        Ok(Self {
            config,
            availability: AvailabilityIndex::new(storage.clone()),
            storage,
            jobs: JobRepository::new(firestore),
            encoding: EncodingConfig::from_env(),
        })
    }
}

/// Run the full pipeline for one job.
///
/// Every failure path leaves the job document terminal: handled failures
/// patch `Failed` with a user-facing message, and unhandled errors get the
/// same patch before the error propagates to the executor.
pub async fn run_pipeline(ctx: &PipelineContext, job: &ProcessSegmentsJob) -> WorkerResult<()> {
    match execute(ctx, job).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(job_id = %job.job_id, error = %e, "pipeline failed");
            let text = e.to_string();
            let patch = JobPatch::new()
                .status(JobStatus::Failed)
                .error(text.clone())
                .suggestions(processing_suggestions(&text));
            if let Err(patch_err) = ctx.jobs.patch(&job.job_id, patch).await {
                error!(job_id = %job.job_id, error = %patch_err, "failed to record job failure");
            }
            Err(e)
        }
    }
}

async fn execute(ctx: &PipelineContext, job: &ProcessSegmentsJob) -> WorkerResult<()> {
    // At-least-once delivery means a claimed message can arrive after the
    // job already finished; a settled job is never re-run.
    let record = ctx.jobs.get(&job.job_id).await?;
    if settled(record.as_ref()) {
        info!(job_id = %job.job_id, "job already settled or missing, ignoring redelivery");
        return Ok(());
    }

    tokio::fs::create_dir_all(&ctx.config.work_dir).await?;
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("stitch-{}-", job.job_id))
        .tempdir_in(&ctx.config.work_dir)?;

    let groups = group_by_asset(&job.segments);
    if groups.is_empty() {
        ctx.jobs
            .patch(
                &job.job_id,
                JobPatch::new()
                    .status(JobStatus::Failed)
                    .error("No segments to process")
                    .suggestions(vec!["Submit at least one segment".to_string()]),
            )
            .await?;
        return Ok(());
    }

    info!(
        job_id = %job.job_id,
        assets = groups.len(),
        segments = job.segments.len(),
        "pipeline started"
    );

    patch_progress(
        ctx,
        job,
        JobPatch::new()
            .status(JobStatus::Processing)
            .progress(Milestone::Analyzing.percent())
            .progress_message("Analyzing requested segments"),
    )
    .await;

    // One listing answers availability for every asset in the job.
    let asset_ids: Vec<String> = groups.iter().map(|g| g.asset_id.clone()).collect();
    let availability = ctx.availability.check(&asset_ids).await;

    // Each asset is downloaded at most once per execution.
    let mut downloaded: HashMap<String, PathBuf> = HashMap::new();
    let mut outcomes: Vec<AssetOutcome> = Vec::new();

    let total = groups.len();
    for (index, group) in groups.iter().enumerate() {
        let budget = ctx.config.asset_timeout;
        let work = process_asset(
            ctx,
            group,
            &availability,
            work_dir.path(),
            &mut downloaded,
            budget,
        );
        let outcome = match tokio::time::timeout(budget, work).await {
            Ok(Ok(clip)) => Ok(clip),
            Ok(Err(reason)) => Err(reason),
            Err(_) => Err(format!(
                "timed out after {} minutes",
                budget.as_secs() / 60
            )),
        };

        match &outcome {
            Ok(clip) => info!(job_id = %job.job_id, asset_id = %group.asset_id, clip = %clip.display(), "asset extracted"),
            Err(reason) => warn!(job_id = %job.job_id, asset_id = %group.asset_id, reason = %reason, "asset skipped"),
        }

        outcomes.push(AssetOutcome {
            asset_id: group.asset_id.clone(),
            outcome,
        });

        patch_progress(
            ctx,
            job,
            JobPatch::new()
                .progress(extraction_progress(index, total))
                .progress_message(format!("Processed video {}/{}", index + 1, total)),
        )
        .await;
    }

    let verdict = summarize_outcomes(outcomes);
    let (clips, note) = match verdict {
        Verdict::Fail { message } => {
            ctx.jobs
                .patch(
                    &job.job_id,
                    JobPatch::new()
                        .status(JobStatus::Failed)
                        .error(message.clone())
                        .suggestions(processing_suggestions(&message)),
                )
                .await?;
            return Ok(());
        }
        Verdict::Proceed { clips, note } => (clips, note),
    };

    patch_progress(
        ctx,
        job,
        JobPatch::new()
            .progress(Milestone::Combining.percent())
            .progress_message("Combining video clips"),
    )
    .await;

    let output = work_dir.path().join("final_clip.mp4");
    combine_clips(&clips, &output, &ctx.encoding).await?;

    patch_progress(
        ctx,
        job,
        JobPatch::new()
            .status(JobStatus::Uploading)
            .progress(Milestone::Uploading.percent())
            .progress_message("Uploading final video"),
    )
    .await;

    let key = format!("edited-clips/{}/final_clip.mp4", job.job_id);
    ctx.storage.upload_clip(&output, &key).await?;

    let url = match ctx.storage.presign_clip(&key, CLIP_URL_TTL).await {
        Ok(url) => url,
        Err(e) => {
            warn!(job_id = %job.job_id, error = %e, "presigning failed, falling back to object URL");
            ctx.storage.clip_object_url(&key)
        }
    };

    let message = match &note {
        Some(note) => format!("Your video is ready. {}", note),
        None => "Your video is ready".to_string(),
    };

    ctx.jobs
        .patch(
            &job.job_id,
            JobPatch::new()
                .status(JobStatus::Complete)
                .progress(Milestone::Done.percent())
                .progress_message(message)
                .final_clip_url(url)
                .final_clip_key(key),
        )
        .await?;

    info!(job_id = %job.job_id, partial = note.is_some(), "pipeline complete");
    Ok(())
}

/// Look up, download (once), and extract one asset.
///
/// Returns the intermediate clip path or a human-readable skip reason.
async fn process_asset(
    ctx: &PipelineContext,
    group: &AssetSegments,
    availability: &HashMap<String, AssetAvailability>,
    work_dir: &Path,
    downloaded: &mut HashMap<String, PathBuf>,
    budget: Duration,
) -> Result<PathBuf, String> {
    let started = tokio::time::Instant::now();
    let asset_id = &group.asset_id;

    let local_path = match downloaded.get(asset_id) {
        Some(path) => path.clone(),
        None => {
            let key = source_key(availability, asset_id)?;
            let path = work_dir.join(format!("source_{}.mp4", asset_id.replace('/', "_")));
            ctx.storage
                .download_source(&key, &path)
                .await
                .map_err(|e| format!("download failed: {}", e))?;
            downloaded.insert(asset_id.clone(), path.clone());
            path
        }
    };

    // The engine runs get whatever the download left of the budget; expiry
    // kills the ffmpeg child instead of abandoning it.
    let opts = ExtractOptions {
        encoding: ctx.encoding.clone(),
        timeout: Some(budget.saturating_sub(started.elapsed())),
    };

    extract_asset_clip(&local_path, asset_id, &group.segments, work_dir, &opts)
        .await
        .map_err(|e| e.to_string())
}

/// Pick the source object key for one asset out of the batch check.
fn source_key(
    availability: &HashMap<String, AssetAvailability>,
    asset_id: &str,
) -> Result<String, String> {
    match availability.get(asset_id) {
        Some(AssetAvailability::Available { key }) => Ok(key.clone()),
        Some(AssetAvailability::CheckFailed { reason }) => {
            Err(format!("availability check failed: {}", reason))
        }
        _ => Err("not found in source storage".to_string()),
    }
}

/// A redelivered message for a job that already settled, or whose document
/// has vanished, is dropped rather than re-run.
fn settled(record: Option<&ClipJob>) -> bool {
    record.map_or(true, |job| job.status.is_terminal())
}

struct AssetOutcome {
    asset_id: String,
    outcome: Result<PathBuf, String>,
}

enum Verdict {
    /// At least one asset produced a clip; `note` names the skipped ones.
    Proceed {
        clips: Vec<PathBuf>,
        note: Option<String>,
    },
    /// Nothing usable came out of any asset.
    Fail { message: String },
}

/// Decide the job outcome from the per-asset results.
///
/// Clip order follows the outcome order, which is first-appearance asset
/// order.
fn summarize_outcomes(outcomes: Vec<AssetOutcome>) -> Verdict {
    let mut clips = Vec::new();
    let mut failures = Vec::new();

    for o in outcomes {
        match o.outcome {
            Ok(clip) => clips.push(clip),
            Err(reason) => failures.push(format!("{} ({})", o.asset_id, reason)),
        }
    }

    if clips.is_empty() {
        Verdict::Fail {
            message: format!("All videos failed: {}", failures.join("; ")),
        }
    } else {
        let note = if failures.is_empty() {
            None
        } else {
            Some(format!("Skipped videos: {}", failures.join("; ")))
        };
        Verdict::Proceed { clips, note }
    }
}

/// Best-effort progress patch. A status write must never kill the job.
async fn patch_progress(ctx: &PipelineContext, job: &ProcessSegmentsJob, patch: JobPatch) {
    if let Err(e) = ctx.jobs.patch(&job.job_id, patch).await {
        warn!(job_id = %job.job_id, error = %e, "progress patch failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch_models::Segment;

    fn job_with_status(status: JobStatus) -> ClipJob {
        let mut job = ClipJob::new(
            None,
            vec![Segment::new("a", 0.0, 5.0)],
            vec!["a".into()],
            vec!["a".into()],
            vec![],
        );
        job.status = status;
        job
    }

    #[test]
    fn test_settled_jobs_are_not_rerun() {
        assert!(settled(Some(&job_with_status(JobStatus::Complete))));
        assert!(settled(Some(&job_with_status(JobStatus::Failed))));
        assert!(settled(None));
    }

    #[test]
    fn test_live_jobs_are_rerun() {
        assert!(!settled(Some(&job_with_status(JobStatus::Queued))));
        assert!(!settled(Some(&job_with_status(JobStatus::Processing))));
    }

    #[test]
    fn test_source_key_lookup() {
        let mut availability = HashMap::new();
        availability.insert(
            "a".to_string(),
            AssetAvailability::Available {
                key: "a_Title.mp4".to_string(),
            },
        );
        availability.insert("b".to_string(), AssetAvailability::Missing);
        availability.insert(
            "c".to_string(),
            AssetAvailability::CheckFailed {
                reason: "listing failed".to_string(),
            },
        );

        assert_eq!(source_key(&availability, "a").as_deref(), Ok("a_Title.mp4"));
        assert_eq!(
            source_key(&availability, "b"),
            Err("not found in source storage".to_string())
        );
        assert!(source_key(&availability, "c")
            .unwrap_err()
            .contains("listing failed"));
        assert_eq!(
            source_key(&availability, "unknown"),
            Err("not found in source storage".to_string())
        );
    }

    fn ok(asset: &str, path: &str) -> AssetOutcome {
        AssetOutcome {
            asset_id: asset.to_string(),
            outcome: Ok(PathBuf::from(path)),
        }
    }

    fn failed(asset: &str, reason: &str) -> AssetOutcome {
        AssetOutcome {
            asset_id: asset.to_string(),
            outcome: Err(reason.to_string()),
        }
    }

    #[test]
    fn test_partial_failure_proceeds_with_note() {
        let verdict = summarize_outcomes(vec![
            failed("a", "timed out after 60 minutes"),
            ok("b", "/tmp/b_clip.mp4"),
        ]);
        match verdict {
            Verdict::Proceed { clips, note } => {
                assert_eq!(clips, vec![PathBuf::from("/tmp/b_clip.mp4")]);
                let note = note.unwrap();
                assert!(note.contains("a (timed out"));
                assert!(!note.contains("b ("));
            }
            Verdict::Fail { .. } => panic!("expected Proceed"),
        }
    }

    #[test]
    fn test_total_failure_aggregates_reasons() {
        let verdict = summarize_outcomes(vec![
            failed("a", "download failed"),
            failed("b", "no usable segments"),
        ]);
        match verdict {
            Verdict::Fail { message } => {
                assert!(message.contains("a (download failed)"));
                assert!(message.contains("b (no usable segments)"));
            }
            Verdict::Proceed { .. } => panic!("expected Fail"),
        }
    }

    #[test]
    fn test_all_success_has_no_note() {
        let verdict = summarize_outcomes(vec![ok("a", "/tmp/a.mp4"), ok("b", "/tmp/b.mp4")]);
        match verdict {
            Verdict::Proceed { clips, note } => {
                assert_eq!(clips.len(), 2);
                assert!(note.is_none());
            }
            Verdict::Fail { .. } => panic!("expected Proceed"),
        }
    }
}
