//! FFmpeg CLI wrapper for the clip pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Timeout and cancellation support via tokio
//! - The per-asset segment extractor and the multi-asset combiner

pub mod combine;
pub mod command;
pub mod error;
pub mod extract;
pub mod probe;
pub mod progress;

pub use combine::combine_clips;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use extract::{extract_asset_clip, ExtractOptions};
pub use probe::{get_duration, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
