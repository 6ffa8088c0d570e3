//! Per-asset segment extraction.
//!
//! Cuts every requested segment out of one source asset and joins them into
//! a single intermediate clip. Cuts are stream copies when the container
//! allows it; a failed copy is retried once with a full re-encode before
//! the segment is given up on.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use stitch_models::{validate_segments, EncodingConfig, Segment};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{get_duration, probe_video};

/// Allowed drift between requested and produced clip duration before a
/// warning is logged. Stream-copy cuts snap to keyframes, so small drift
/// is expected and never fatal.
const DURATION_TOLERANCE_SECS: f64 = 1.0;

/// Options for segment extraction.
#[derive(Default)]
pub struct ExtractOptions {
    /// Re-encode profile for the copy-failure fallback.
    pub encoding: EncodingConfig,
    /// Wall-clock budget applied to every FFmpeg run; expiry kills the
    /// engine process.
    pub timeout: Option<Duration>,
}

impl ExtractOptions {
    fn runner(&self) -> FfmpegRunner {
        match self.timeout {
            Some(t) => FfmpegRunner::new().with_timeout(t.as_secs().max(1)),
            None => FfmpegRunner::new(),
        }
    }
}

/// Extract all segments of one asset into a single intermediate clip.
///
/// Segments are cut in submission order and joined in that same order;
/// chronological position in the source is irrelevant. Returns the path of
/// the joined clip inside `work_dir`.
pub async fn extract_asset_clip(
    asset_path: impl AsRef<Path>,
    asset_id: &str,
    segments: &[Segment],
    work_dir: impl AsRef<Path>,
    opts: &ExtractOptions,
) -> MediaResult<PathBuf> {
    let asset_path = asset_path.as_ref();
    let work_dir = work_dir.as_ref();

    let info = probe_video(asset_path).await?;
    debug!(
        asset_id,
        duration = info.duration,
        codec = %info.codec,
        "probed source asset"
    );

    let validated = validate_segments(segments, info.duration);
    if validated.kept.is_empty() {
        return Err(MediaError::NoUsableSegments {
            asset_id: asset_id.to_string(),
        });
    }

    let file_stem = sanitize_for_filename(asset_id);
    let mut cut_paths = Vec::with_capacity(validated.kept.len());

    for (idx, seg) in validated.kept.iter().enumerate() {
        let cut_path = work_dir.join(format!("{}_seg{:03}.mp4", file_stem, idx));
        cut_segment(asset_path, &cut_path, seg, opts).await?;
        cut_paths.push(cut_path);
    }

    let clip_path = work_dir.join(format!("{}_clip.mp4", file_stem));
    if cut_paths.len() == 1 {
        tokio::fs::rename(&cut_paths[0], &clip_path).await?;
    } else {
        join_cuts(&cut_paths, &clip_path, work_dir, &file_stem, opts).await?;
    }

    verify_duration(&clip_path, validated.expected_duration(), asset_id).await;

    info!(asset_id, clip = %clip_path.display(), cuts = cut_paths.len(), "asset clip ready");
    Ok(clip_path)
}

/// Cut a single segment, stream copy first, one re-encode retry.
async fn cut_segment(
    input: &Path,
    output: &Path,
    seg: &Segment,
    opts: &ExtractOptions,
) -> MediaResult<()> {
    let duration = seg.requested_duration();

    let copy_cmd = FfmpegCommand::new(input, output)
        .seek(seg.start_seconds)
        .duration(duration)
        .codec_copy();

    match opts.runner().run(&copy_cmd).await {
        Ok(()) => {
            if output_is_nonempty(output).await {
                return Ok(());
            }
            warn!(
                asset_id = %seg.asset_id,
                start = seg.start_seconds,
                "copy cut produced an empty file, re-encoding"
            );
        }
        Err(e) if e.is_engine_failure() => {
            warn!(
                asset_id = %seg.asset_id,
                start = seg.start_seconds,
                error = %e,
                "copy cut failed, re-encoding"
            );
        }
        Err(e) => return Err(e),
    }

    let encode_cmd = FfmpegCommand::new(input, output)
        .seek(seg.start_seconds)
        .duration(duration)
        .output_args(opts.encoding.to_ffmpeg_args());

    opts.runner().run(&encode_cmd).await?;

    if !output_is_nonempty(output).await {
        return Err(MediaError::EmptyOutput(output.to_path_buf()));
    }
    Ok(())
}

/// Join segment cuts with the concat demuxer, re-encoding on failure.
async fn join_cuts(
    cuts: &[PathBuf],
    output: &Path,
    work_dir: &Path,
    file_stem: &str,
    opts: &ExtractOptions,
) -> MediaResult<()> {
    let list_path = work_dir.join(format!("{}_concat.txt", file_stem));
    tokio::fs::write(&list_path, concat_list(cuts)).await?;

    let copy_cmd = FfmpegCommand::new(&list_path, output)
        .concat_demuxer()
        .codec_copy();

    match opts.runner().run(&copy_cmd).await {
        Ok(()) if output_is_nonempty(output).await => return Ok(()),
        Ok(()) => warn!(file_stem, "copy concat produced an empty file, re-encoding"),
        Err(e) if e.is_engine_failure() => {
            warn!(file_stem, error = %e, "copy concat failed, re-encoding")
        }
        Err(e) => return Err(e),
    }

    let encode_cmd = FfmpegCommand::new(&list_path, output)
        .concat_demuxer()
        .output_args(opts.encoding.to_ffmpeg_args());

    opts.runner().run(&encode_cmd).await?;

    if !output_is_nonempty(output).await {
        return Err(MediaError::EmptyOutput(output.to_path_buf()));
    }
    Ok(())
}

/// Compare produced clip duration against the expected sum.
async fn verify_duration(clip: &Path, expected: f64, asset_id: &str) {
    match get_duration(clip).await {
        Ok(actual) => {
            let drift = (actual - expected).abs();
            if drift > DURATION_TOLERANCE_SECS {
                warn!(
                    asset_id,
                    expected, actual, drift, "clip duration drifted beyond tolerance"
                );
            }
        }
        Err(e) => warn!(asset_id, error = %e, "could not verify clip duration"),
    }
}

/// Build the concat demuxer list body.
///
/// Single quotes inside paths are escaped the way the demuxer expects
/// (`'` closes, `\'` quotes, `'` reopens).
fn concat_list(paths: &[PathBuf]) -> String {
    let mut body = String::new();
    for path in paths {
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        body.push_str(&format!("file '{}'\n", escaped));
    }
    body
}

async fn output_is_nonempty(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len() > 0)
        .unwrap_or(false)
}

fn sanitize_for_filename(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_list_format() {
        let list = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/b.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/b.mp4'\n");
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/tmp/it's.mp4")]);
        assert!(list.contains(r"it'\''s"));
    }

    #[test]
    fn test_sanitize_for_filename() {
        assert_eq!(sanitize_for_filename("abc-123_XYZ"), "abc-123_XYZ");
        assert_eq!(sanitize_for_filename("a/b:c"), "a_b_c");
    }

    #[tokio::test]
    async fn test_missing_asset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_asset_clip(
            dir.path().join("nope.mp4"),
            "nope",
            &[Segment::new("nope", 0.0, 1.0)],
            dir.path(),
            &ExtractOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
