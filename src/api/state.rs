//! Application state for the API server

use crate::config::Config;
use crate::db::Database;
use crate::executor::Prober;
use crate::jobs::{Enqueuer, RetryScanner};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Job store
    pub db: Database,

    /// Producer side of the submission queue and the schedule list
    pub enqueuer: Enqueuer,

    /// Expands a requested URL into job specs
    pub prober: Arc<dyn Prober>,

    /// Configuration (read-only at runtime)
    pub config: Arc<Config>,

    /// Stops the server; also armed by a failed probe
    pub shutdown: ShutdownSignal,
}

impl AppState {
    /// Create a new AppState over an open store
    pub fn new(db: Database, config: Arc<Config>, prober: Arc<dyn Prober>) -> Self {
        let enqueuer = Enqueuer::new(
            db.clone(),
            &config.store.queue_key,
            &config.store.requests_key,
        );
        Self {
            db,
            enqueuer,
            prober,
            config,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Retry scanner over the configured namespace
    pub fn retry_scanner(&self) -> RetryScanner {
        RetryScanner::new(
            self.db.clone(),
            self.config.store.namespace.clone(),
            self.config.worker.max_retries,
            self.config.store.job_ttl,
        )
    }
}

/// Graceful shutdown trigger shared by the server, its handlers and signal handling
///
/// A broken downloader cannot be repaired from inside the process, so a
/// failed probe schedules a shutdown and the server reports it on exit. The
/// supervisor restarts the service with a fresh environment.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    probe_failed: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// A signal that has not fired
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when the server should stop
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop the server now
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Stop the server after `delay`, leaving time for the current response to go out
    pub fn trigger_after_probe_failure(&self, delay: Duration) {
        if self.probe_failed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::error!(
            delay_ms = delay.as_millis() as u64,
            "downloader probe failed, shutting down for restart"
        );
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            token.cancel();
        });
    }

    /// Whether a failed probe caused the shutdown
    pub fn probe_failed(&self) -> bool {
        self.probe_failed.load(Ordering::SeqCst)
    }
}
