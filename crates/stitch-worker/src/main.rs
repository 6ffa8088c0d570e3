//! Pipeline worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stitch_media::{check_ffmpeg, check_ffprobe};
use stitch_queue::JobQueue;
use stitch_worker::{JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("stitch=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    info!("Starting stitch-worker");

    // The engine binaries are a hard requirement; fail at boot, not mid-job.
    if let Err(e) = check_ffmpeg().and(check_ffprobe()) {
        error!("Media tooling missing: {}", e);
        std::process::exit(1);
    }

    let config = WorkerConfig::from_env();
    info!(
        "Worker config: max_jobs={}, asset_timeout={}s, work_dir={}",
        config.max_concurrent_jobs,
        config.asset_timeout.as_secs(),
        config.work_dir
    );

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let executor = Arc::new(JobExecutor::new(config, queue));

    let shutdown_executor = executor.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            shutdown_executor.shutdown();
        }
    });

    if let Err(e) = executor.run().await {
        error!("Executor failed: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
