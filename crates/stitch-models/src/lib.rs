//! Shared data models for the ClipStitch backend.
//!
//! This crate provides Serde-serializable types for:
//! - Clip segments and per-asset grouping
//! - Jobs and the job status state machine
//! - Acquisition failure classification
//! - Encoding configuration
//! - Progress milestones

pub mod acquisition;
pub mod encoding;
pub mod job;
pub mod job_status;
pub mod progress;
pub mod segment;

// Re-export common types
pub use acquisition::AcquisitionFailureKind;
pub use encoding::EncodingConfig;
pub use job::{ClipJob, JobId};
pub use job_status::JobStatus;
pub use progress::{extraction_progress, Milestone};
pub use segment::{
    group_by_asset, unique_asset_ids, validate_segments, AssetSegments, Segment, SegmentDrop,
    ValidatedSegments,
};
