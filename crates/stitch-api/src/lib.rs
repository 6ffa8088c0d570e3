//! Axum HTTP dispatcher.
//!
//! This crate provides:
//! - Job submission with synchronous validation and availability check
//! - The acquisition trigger client and its completion webhook
//! - Job polling, resume, and source download URLs

pub mod acquisition;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use acquisition::{AcquisitionClient, AcquisitionConfig};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
