//! # mediaq
//!
//! Durable download job queue around an external downloader.
//!
//! Producers probe a requested URL into one or more jobs and append them to a
//! submission queue. Each worker activation claims one job (preferring failed
//! jobs that may still be retried), runs the downloader into a staging
//! directory, delivers the produced file to its final location and records the
//! outcome. Job state lives only in the store, under keys of the form
//! `<namespace>:<status>:<job_id>`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mediaq::executor::NoOpExecutor;
//! use mediaq::jobs::Enqueuer;
//! use mediaq::types::JobSpec;
//! use mediaq::{Config, Database, Worker};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let db = Database::new(&config.store.database_path).await?;
//!
//!     let enqueuer = Enqueuer::new(db.clone(), &config.store.queue_key, &config.store.requests_key);
//!     enqueuer.enqueue(&JobSpec::new("https://video.example/watch?v=1")).await?;
//!
//!     let worker = Worker::new(db, &config, Arc::new(NoOpExecutor));
//!     println!("{:?}", worker.run_once().await?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Job store
pub mod db;
/// Error types
pub mod error;
/// External downloader integration
pub mod executor;
/// Job lifecycle: migration, retry scanning, enqueueing
pub mod jobs;
/// File delivery from staging to the final root
pub mod reconcile;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;
/// Worker activations
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, ReconcileError, Result, ToHttpStatus};
pub use types::{JobId, JobKey, JobRecord, JobSpec, JobStatus, WorkOutcome};
pub use worker::Worker;

/// Wait for a termination signal.
///
/// - **Unix:** SIGTERM or SIGINT, falling back to whichever handler could be registered.
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use mediaq::api::ShutdownSignal;
///
/// # async fn example() {
/// let shutdown = ShutdownSignal::new();
/// tokio::spawn({
///     let shutdown = shutdown.clone();
///     async move {
///         mediaq::wait_for_signal().await;
///         shutdown.trigger();
///     }
/// });
/// # }
/// ```
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("received SIGTERM");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("received SIGINT");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "could not register any signal handler, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

/// Wait for a termination signal (Ctrl+C on this platform)
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
    }
}
