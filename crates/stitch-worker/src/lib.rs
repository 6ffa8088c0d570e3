//! Clip pipeline worker.
//!
//! This crate provides:
//! - The queue consumer loop with retry and DLQ handling
//! - The pipeline coordinator: download, extract, combine, upload
//! - Error-text classification into user-facing suggestions

pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod suggestions;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use pipeline::{run_pipeline, PipelineContext};
