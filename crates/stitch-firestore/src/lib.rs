//! Firestore REST API client and the clip job store.
//!
//! This crate provides:
//! - A Firestore REST client with token caching and retry
//! - The `videoJobs` repository with additive field-mask patches

pub mod client;
pub mod error;
pub mod jobs;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use jobs::{JobPatch, JobRepository, JOBS_COLLECTION};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, StructuredQuery, ToFirestoreValue, Value};
