//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mediaq::executor::{DownloadExecutor, ExecutionOutcome, ExecutionRequest};
use mediaq::{Config, Database};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// A store plus staging and final roots inside one temporary directory
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
    pub db: Database,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.store.database_path = dir.path().join("store/mediaq.db");
        config.store.namespace = "it:jobs".to_string();
        config.worker.pop_timeout = Duration::from_millis(200);
        config.worker.pop_poll_interval = Duration::from_millis(20);
        config.reconcile.staging_root = dir.path().join("staging");
        config.reconcile.final_root = dir.path().join("final");
        config.reconcile.copy_timeout = Duration::from_secs(1);
        config.reconcile.poll_interval = Duration::from_millis(50);

        let db = Database::new(&config.store.database_path)
            .await
            .expect("open store");
        Self { dir, config, db }
    }

    pub fn final_path(&self, relative: &str) -> PathBuf {
        self.config.reconcile.final_root.join(relative)
    }
}

/// Downloader that writes `<title> [<job_id>].mp4` into the staging directory
pub struct WritingExecutor {
    pub staging_root: PathBuf,
    pub title: &'static str,
}

#[async_trait]
impl DownloadExecutor for WritingExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> mediaq::Result<ExecutionOutcome> {
        let dir = self.staging_root.join(&request.savedir);
        tokio::fs::create_dir_all(&dir).await?;
        let name = format!("{} [{}].mp4", self.title, request.job_id);
        tokio::fs::write(dir.join(&name), b"media bytes").await?;
        Ok(ExecutionOutcome::succeeded(name))
    }

    fn name(&self) -> &'static str {
        "writing"
    }
}

/// Downloader whose every run fails
pub struct FailingExecutor;

#[async_trait]
impl DownloadExecutor for FailingExecutor {
    async fn execute(&self, _request: &ExecutionRequest) -> mediaq::Result<ExecutionOutcome> {
        Ok(ExecutionOutcome::failed("ERROR: network unreachable"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
