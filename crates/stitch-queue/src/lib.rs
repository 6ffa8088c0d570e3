//! Redis Streams job queue.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams with idempotency-key deduplication
//! - Worker consumption with consumer groups, retry tracking, and a DLQ
//! - Stale-message claiming for crashed workers

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{ProcessSegmentsJob, QueueJob};
pub use queue::{JobQueue, QueueConfig};
