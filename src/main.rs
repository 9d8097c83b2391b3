//! mediaq binary
//!
//! `serve` runs the ingestion API, `work` performs one worker activation and
//! exits, `reset-retries` makes every failed job eligible for retry again.

use clap::{Parser, Subcommand};
use mediaq::api::{AppState, start_api_server};
use mediaq::executor::{CliExecutor, CliProber, DownloadExecutor, NoOpExecutor};
use mediaq::jobs::RetryScanner;
use mediaq::{Config, Database, Result, Worker};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mediaq")]
#[command(about = "Durable download job queue", long_about = None)]
struct Cli {
    /// JSON configuration file; every setting has a default
    #[arg(long, short, env = "MEDIAQ_CONFIG")]
    config: Option<PathBuf>,

    /// Job store database path
    #[arg(long, env = "MEDIAQ_DATABASE")]
    database: Option<PathBuf>,

    /// Directory the downloader writes into
    #[arg(long, env = "MEDIAQ_STAGING_ROOT")]
    staging_root: Option<PathBuf>,

    /// Directory finished files are delivered to
    #[arg(long, env = "MEDIAQ_FINAL_ROOT")]
    final_root: Option<PathBuf>,

    /// Downloader executable (searched in PATH when omitted)
    #[arg(long, env = "MEDIAQ_DOWNLOADER")]
    downloader: Option<PathBuf>,

    /// Failures after which a job is no longer retried
    #[arg(long, env = "MEDIAQ_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Seconds a worker waits on an empty queue
    #[arg(long, env = "MEDIAQ_POP_TIMEOUT")]
    pop_timeout: Option<u64>,

    /// Seconds a job record lives after its last transition
    #[arg(long, env = "MEDIAQ_JOB_TTL")]
    job_ttl: Option<u64>,

    /// Seconds to wait for the downloaded file to show up in staging
    #[arg(long, env = "MEDIAQ_COPY_TIMEOUT")]
    copy_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingestion API
    Serve {
        /// Address to listen on
        #[arg(long, env = "MEDIAQ_BIND")]
        bind: Option<SocketAddr>,
    },
    /// Perform one unit of work and exit
    Work,
    /// Reset the failure count of every failed job
    ResetRetries,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Flags and environment win over the config file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.database {
            config.store.database_path = path.clone();
        }
        if let Some(path) = &self.staging_root {
            config.reconcile.staging_root = path.clone();
        }
        if let Some(path) = &self.final_root {
            config.reconcile.final_root = path.clone();
        }
        if let Some(path) = &self.downloader {
            config.tools.downloader_path = Some(path.clone());
        }
        if let Some(max_retries) = self.max_retries {
            config.worker.max_retries = max_retries;
        }
        if let Some(secs) = self.pop_timeout {
            config.worker.pop_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.job_ttl {
            config.store.job_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.copy_timeout {
            config.reconcile.copy_timeout = Duration::from_secs(secs);
        }
        if let Command::Serve { bind: Some(bind) } = &self.command {
            config.api.bind_address = *bind;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mediaq=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "mediaq exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    let db = open_store(&config).await?;

    match cli.command {
        Command::Serve { .. } => serve(db, config).await,
        Command::Work => work(db, config).await,
        Command::ResetRetries => {
            let scanner = RetryScanner::new(
                db.clone(),
                config.store.namespace.clone(),
                config.worker.max_retries,
                config.store.job_ttl,
            );
            let count = scanner.reset_all_failed_counts().await?;
            println!("Reset failed_count for {count} failed jobs.");
            db.close().await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Open the store or fail; no command runs without it
async fn open_store(config: &Config) -> Result<Database> {
    let db = Database::new(&config.store.database_path).await?;
    let purged = db.purge_expired().await?;
    tracing::info!(
        path = %config.store.database_path.display(),
        purged,
        "job store ready"
    );
    Ok(db)
}

async fn serve(db: Database, config: Config) -> Result<ExitCode> {
    let prober = CliProber::from_config(&config.tools).unwrap_or_else(|| {
        // Probes will fail, which shuts the server down for a restart
        tracing::warn!(
            binary = %config.tools.downloader_binary,
            "downloader not found, probes will fail"
        );
        CliProber::new(
            PathBuf::from(&config.tools.downloader_binary),
            config.tools.timeout,
        )
    });

    let state = AppState::new(db.clone(), Arc::new(config), Arc::new(prober));
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        mediaq::wait_for_signal().await;
        shutdown.trigger();
    });

    let result = start_api_server(state).await;
    db.close().await;
    result.map(|()| ExitCode::SUCCESS)
}

async fn work(db: Database, config: Config) -> Result<ExitCode> {
    let executor: Arc<dyn DownloadExecutor> =
        match CliExecutor::from_config(&config.tools, &config.reconcile) {
            Some(executor) => Arc::new(executor),
            None => {
                tracing::warn!(
                    binary = %config.tools.downloader_binary,
                    "downloader not found, jobs will be recorded as failed"
                );
                Arc::new(NoOpExecutor)
            }
        };

    let worker = Worker::new(db.clone(), &config, executor);
    let outcome = tokio::select! {
        outcome = worker.run_once() => outcome?,
        _ = mediaq::wait_for_signal() => {
            tracing::info!("interrupted, exiting");
            return Ok(ExitCode::SUCCESS);
        }
    };

    tracing::info!(outcome = ?outcome, "worker activation finished");
    db.close().await;
    Ok(ExitCode::from(outcome.exit_code() as u8))
}
