//! Application state.

use std::sync::Arc;

use stitch_firestore::{FirestoreClient, JobRepository};
use stitch_queue::JobQueue;
use stitch_storage::{AvailabilityIndex, StorageClient};

use crate::acquisition::{AcquisitionClient, AcquisitionConfig};
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<StorageClient>,
    pub availability: AvailabilityIndex,
    pub jobs: JobRepository,
    pub queue: Arc<JobQueue>,
    /// None when the provider is not configured; jobs needing acquisition
    /// then fail at submission.
    pub acquisition: Option<AcquisitionClient>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = StorageClient::from_env()?;
        let firestore = FirestoreClient::from_env()?;
        let queue = JobQueue::from_env()?;

        let acquisition = match AcquisitionConfig::from_env() {
            Some(cfg) => Some(AcquisitionClient::new(cfg)?),
            None => {
                tracing::warn!("acquisition provider not configured, missing assets will fail");
                None
            }
        };

        let availability = AvailabilityIndex::new(storage.clone());

        Ok(Self {
            config,
            storage: Arc::new(storage),
            availability,
            jobs: JobRepository::new(firestore),
            queue: Arc::new(queue),
            acquisition,
        })
    }
}
