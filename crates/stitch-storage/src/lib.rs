//! Object storage for ClipStitch.
//!
//! This crate provides:
//! - Upload/download against an S3-compatible store
//! - Presigned URL generation with a public-URL fallback
//! - The asset availability index (one listing, pattern-matched per asset)

pub mod availability;
pub mod client;
pub mod error;

pub use availability::{match_asset_key, AssetAvailability, AvailabilityIndex};
pub use client::{ObjectInfo, StorageClient, StorageConfig};
pub use error::{StorageError, StorageResult};
