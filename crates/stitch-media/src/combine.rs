//! Multi-asset combination.
//!
//! Joins the per-asset intermediate clips into the final deliverable. The
//! input order is the order the caller hands over, which is the
//! first-appearance order of assets in the request.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use stitch_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Combine intermediate clips into one output file.
///
/// A single input is copied through unchanged. Multiple inputs go through
/// the concat demuxer with stream copy; if the sources disagree on codecs
/// or parameters badly enough that the copy fails, the fallback re-encodes
/// everything through a filter-graph concat.
pub async fn combine_clips(
    clips: &[PathBuf],
    output: impl AsRef<Path>,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    let output = output.as_ref();

    match clips {
        [] => return Err(MediaError::NothingToCombine),
        [single] => {
            info!(clip = %single.display(), "single asset, copying through");
            tokio::fs::copy(single, output).await?;
        }
        many => {
            concat_many(many, output, encoding).await?;
        }
    }

    let meta = tokio::fs::metadata(output).await?;
    if meta.len() == 0 {
        return Err(MediaError::EmptyOutput(output.to_path_buf()));
    }

    info!(output = %output.display(), inputs = clips.len(), "combined final clip");
    Ok(())
}

async fn concat_many(
    clips: &[PathBuf],
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    let work_dir = output.parent().unwrap_or_else(|| Path::new("."));
    let list_path = work_dir.join("combine_concat.txt");

    let mut body = String::new();
    for clip in clips {
        let escaped = clip.to_string_lossy().replace('\'', "'\\''");
        body.push_str(&format!("file '{}'\n", escaped));
    }
    tokio::fs::write(&list_path, body).await?;

    let copy_cmd = FfmpegCommand::new(&list_path, output)
        .concat_demuxer()
        .codec_copy();

    match FfmpegRunner::new().run(&copy_cmd).await {
        Ok(()) => return Ok(()),
        Err(e) if e.is_engine_failure() => {
            warn!(error = %e, "copy combine failed, re-encoding through filter graph");
        }
        Err(e) => return Err(e),
    }

    let encode_cmd = FfmpegCommand::with_inputs(clips, output)
        .filter_complex(concat_filter(clips.len()))
        .output_arg("-map")
        .output_arg("[v]")
        .output_arg("-map")
        .output_arg("[a]")
        .output_args(encoding.to_ffmpeg_args());

    FfmpegRunner::new().run(&encode_cmd).await
}

/// Build the filter-graph concat expression for `n` inputs.
fn concat_filter(n: usize) -> String {
    let mut filter = String::new();
    for i in 0..n {
        filter.push_str(&format!("[{i}:v][{i}:a]"));
    }
    filter.push_str(&format!("concat=n={n}:v=1:a=1[v][a]"));
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_filter() {
        assert_eq!(
            concat_filter(2),
            "[0:v][0:a][1:v][1:a]concat=n=2:v=1:a=1[v][a]"
        );
        assert_eq!(concat_filter(1), "[0:v][0:a]concat=n=1:v=1:a=1[v][a]");
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = combine_clips(
            &[],
            dir.path().join("out.mp4"),
            &EncodingConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::NothingToCombine));
    }
}
