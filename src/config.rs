//! Configuration types for mediaq

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Job store settings (database location, key layout, record lifetime)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database path (default: "./mediaq.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Prefix of every job record key (default: "mediaq:jobs")
    ///
    /// Records live at `<namespace>:<status>:<job_id>`.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Key of the submission queue list (default: "mediaq:queue")
    #[serde(default = "default_queue_key")]
    pub queue_key: String,

    /// Key of the deferred request list (default: "mediaq:requests")
    #[serde(default = "default_requests_key")]
    pub requests_key: String,

    /// Lifetime of a job record, renewed on every transition (default: 7 days)
    #[serde(default = "default_job_ttl", with = "duration_serde")]
    pub job_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            namespace: default_namespace(),
            queue_key: default_queue_key(),
            requests_key: default_requests_key(),
            job_ttl: default_job_ttl(),
        }
    }
}

/// Worker activation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// How long a worker waits on an empty queue before reporting no work (default: 60 seconds)
    #[serde(default = "default_pop_timeout", with = "duration_serde")]
    pub pop_timeout: Duration,

    /// Interval between queue polls while waiting (default: 250 ms)
    #[serde(default = "default_pop_poll_interval", with = "millis_serde")]
    pub pop_poll_interval: Duration,

    /// A failed job is retried while its failure count is below this (default: 5)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pop_timeout: default_pop_timeout(),
            pop_poll_interval: default_pop_poll_interval(),
            max_retries: default_max_retries(),
        }
    }
}

/// External downloader settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the downloader executable (auto-detected if None)
    #[serde(default)]
    pub downloader_path: Option<PathBuf>,

    /// Binary name searched in PATH when no explicit path is set (default: "yt-dlp")
    #[serde(default = "default_downloader_binary")]
    pub downloader_binary: String,

    /// Whether to search PATH for the downloader if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Flags passed before the caller's options on every download
    #[serde(default = "default_base_flags")]
    pub base_flags: Vec<String>,

    /// Output file template; `{job_id}` is replaced with the job id
    ///
    /// The job id must survive in the produced file name, the reconciler matches on it.
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// Kill the downloader after this long (None = no limit)
    #[serde(default, with = "optional_duration_serde")]
    pub timeout: Option<Duration>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            downloader_path: None,
            downloader_binary: default_downloader_binary(),
            search_path: true,
            base_flags: default_base_flags(),
            output_template: default_output_template(),
            timeout: None,
        }
    }
}

impl ToolsConfig {
    /// Resolve the downloader executable from the explicit path or PATH
    pub fn resolve_downloader(&self) -> Option<PathBuf> {
        if let Some(path) = &self.downloader_path {
            return Some(path.clone());
        }
        if self.search_path {
            return which::which(&self.downloader_binary).ok();
        }
        None
    }
}

/// File delivery settings for the reconciler
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Directory the downloader writes into (default: "/tmp/mediaq")
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,

    /// Directory finished files are delivered to (default: "./downloads")
    #[serde(default = "default_final_root")]
    pub final_root: PathBuf,

    /// Give up locating or placing the file after this long (default: 120 seconds)
    #[serde(default = "default_copy_timeout", with = "duration_serde")]
    pub copy_timeout: Duration,

    /// Interval between staging directory scans (default: 1000 ms)
    #[serde(default = "default_poll_interval", with = "millis_serde")]
    pub poll_interval: Duration,

    /// Extensions (without dot, lowercase) that count as a finished media file
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,

    /// Extensions marking a download still in progress; never matched
    #[serde(default = "default_partial_extensions")]
    pub partial_extensions: Vec<String>,

    /// Filename budget in bytes, extension included (default: 255)
    #[serde(default = "default_max_filename_bytes")]
    pub max_filename_bytes: usize,

    /// Base name used when a display name sanitizes to nothing (default: "download")
    #[serde(default = "default_placeholder_name")]
    pub placeholder_name: String,

    /// Delete the staged file once it is delivered (default: true)
    #[serde(default = "default_true")]
    pub remove_staged: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            staging_root: default_staging_root(),
            final_root: default_final_root(),
            copy_timeout: default_copy_timeout(),
            poll_interval: default_poll_interval(),
            media_extensions: default_media_extensions(),
            partial_extensions: default_partial_extensions(),
            max_filename_bytes: default_max_filename_bytes(),
            placeholder_name: default_placeholder_name(),
            remove_staged: true,
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:5000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Delay between answering a failed probe and shutting the server down (default: 500 ms)
    #[serde(default = "default_probe_failure_exit_delay", with = "millis_serde")]
    pub probe_failure_exit_delay: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            probe_failure_exit_delay: default_probe_failure_exit_delay(),
        }
    }
}

/// Main configuration
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Job store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Worker activation settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// External downloader settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// File delivery settings
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would break the key layout or the reconciler
    pub fn validate(&self) -> Result<()> {
        if self.store.namespace.is_empty() {
            return Err(Error::Config {
                message: "namespace must not be empty".to_string(),
                key: Some("store.namespace".to_string()),
            });
        }
        if self.store.queue_key == self.store.requests_key {
            return Err(Error::Config {
                message: "queue and request lists must use different keys".to_string(),
                key: Some("store.requests_key".to_string()),
            });
        }
        if !self.tools.output_template.contains("{job_id}") {
            return Err(Error::Config {
                message: "output template must contain {job_id}".to_string(),
                key: Some("tools.output_template".to_string()),
            });
        }
        if self.reconcile.max_filename_bytes < 16 {
            return Err(Error::Config {
                message: "filename budget must be at least 16 bytes".to_string(),
                key: Some("reconcile.max_filename_bytes".to_string()),
            });
        }
        if self.reconcile.placeholder_name.trim().is_empty() {
            return Err(Error::Config {
                message: "placeholder name must not be empty".to_string(),
                key: Some("reconcile.placeholder_name".to_string()),
            });
        }
        Ok(())
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./mediaq.db")
}

fn default_namespace() -> String {
    "mediaq:jobs".to_string()
}

fn default_queue_key() -> String {
    "mediaq:queue".to_string()
}

fn default_requests_key() -> String {
    "mediaq:requests".to_string()
}

fn default_job_ttl() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_pop_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_pop_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_max_retries() -> u32 {
    5
}

fn default_downloader_binary() -> String {
    "yt-dlp".to_string()
}

fn default_base_flags() -> Vec<String> {
    vec!["--no-progress".to_string(), "--no-playlist".to_string()]
}

fn default_output_template() -> String {
    "%(title).180B [{job_id}].%(ext)s".to_string()
}

fn default_true() -> bool {
    true
}

fn default_staging_root() -> PathBuf {
    PathBuf::from("/tmp/mediaq")
}

fn default_final_root() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_copy_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_media_extensions() -> Vec<String> {
    [
        "mp4", "m4v", "mkv", "webm", "mov", "avi", "flv", "3gp", "ts", "m4a", "mp3", "aac",
        "opus", "ogg", "oga", "flac", "wav", "alac",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_partial_extensions() -> Vec<String> {
    ["part", "ytdl", "temp", "tmp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_filename_bytes() -> usize {
    255
}

fn default_placeholder_name() -> String {
    "download".to_string()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_probe_failure_exit_delay() -> Duration {
    Duration::from_millis(500)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Sub-second intervals are configured in milliseconds
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.store.namespace, "mediaq:jobs");
        assert_eq!(config.store.queue_key, "mediaq:queue");
        assert_eq!(config.store.job_ttl, Duration::from_secs(604_800));
        assert_eq!(config.worker.max_retries, 5);
        assert_eq!(config.worker.pop_timeout, Duration::from_secs(60));
        assert_eq!(config.reconcile.copy_timeout, Duration::from_secs(120));
        assert_eq!(config.reconcile.max_filename_bytes, 255);
        assert!(config.reconcile.remove_staged);
        assert!(config.tools.timeout.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn durations_use_seconds_and_intervals_use_millis() {
        let config: Config = serde_json::from_str(
            r#"{
                "worker": {"pop_timeout": 5, "pop_poll_interval": 20},
                "reconcile": {"copy_timeout": 3, "poll_interval": 50},
                "tools": {"timeout": 600}
            }"#,
        )
        .unwrap();

        assert_eq!(config.worker.pop_timeout, Duration::from_secs(5));
        assert_eq!(config.worker.pop_poll_interval, Duration::from_millis(20));
        assert_eq!(config.reconcile.copy_timeout, Duration::from_secs(3));
        assert_eq!(config.reconcile.poll_interval, Duration::from_millis(50));
        assert_eq!(config.tools.timeout, Some(Duration::from_secs(600)));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["worker"]["pop_poll_interval"], 20);
        assert_eq!(json["reconcile"]["copy_timeout"], 3);
    }

    #[test]
    fn validate_rejects_template_without_job_id() {
        let mut config = Config::default();
        config.tools.output_template = "%(title)s.%(ext)s".to_string();

        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("tools.output_template"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_shared_list_keys() {
        let mut config = Config::default();
        config.store.requests_key = config.store.queue_key.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reads_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"store": {{"namespace": "test:jobs"}}, "worker": {{"max_retries": 2}}}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.store.namespace, "test:jobs");
        assert_eq!(config.worker.max_retries, 2);
    }

    #[test]
    fn explicit_downloader_path_wins_over_search() {
        let tools = ToolsConfig {
            downloader_path: Some(PathBuf::from("/opt/bin/yt-dlp")),
            ..Default::default()
        };
        assert_eq!(
            tools.resolve_downloader(),
            Some(PathBuf::from("/opt/bin/yt-dlp"))
        );

        let tools = ToolsConfig {
            search_path: false,
            ..Default::default()
        };
        assert_eq!(tools.resolve_downloader(), None);
    }
}
