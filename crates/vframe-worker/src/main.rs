//! Frame-extraction worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vframe_media::FfmpegExtractor;
use vframe_storage::{FrameStore, S3ObjectStore};
use vframe_store::MemoryJobStore;
use vframe_worker::source::AutoSource;
use vframe_worker::{JobExecutor, ProcessingContext, StuckJobReaper, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vframe=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vframe-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let objects = match S3ObjectStore::from_env() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create object store: {}", e);
            std::process::exit(1);
        }
    };

    // Single-node store; a relational backend slots in behind the same
    // trait for multi-process deployments.
    let store = Arc::new(MemoryJobStore::new());
    let frames = Arc::new(FrameStore::new(objects, store.clone()));

    let extractor = Arc::new(
        FfmpegExtractor::new().with_timeout(config.extraction_timeout.as_secs()),
    );

    let ctx = ProcessingContext {
        store: store.clone(),
        frames,
        extractor,
        source: Arc::new(AutoSource::new()),
        config: config.clone(),
    };

    // The reaper is the sole recovery path for workers that die without
    // writing a terminal state.
    let reaper = StuckJobReaper::new(
        store,
        config.max_processing_duration,
        config.sweep_interval,
    );
    tokio::spawn(async move { reaper.run().await });

    let executor = Arc::new(JobExecutor::new(ctx));

    // Setup signal handler
    let executor_for_signal = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        executor_for_signal.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
