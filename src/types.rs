//! Core types for mediaq

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Field map of a stored job record; every value is text
pub type Fields = BTreeMap<String, String>;

/// Field names used in job records
pub mod fields {
    /// Current status, mirrors the status segment of the key
    pub const STATUS: &str = "status";
    /// Source URL
    pub const URL: &str = "url";
    /// Downloader options as a JSON array of strings
    pub const OPTIONS: &str = "options";
    /// Save directory relative to the staging and final roots
    pub const SAVEDIR: &str = "savedir";
    /// Advisory display name for the delivered file
    pub const FILENAME: &str = "filename";
    /// Unix timestamp of the claim
    pub const CREATED_AT: &str = "created_at";
    /// Unix timestamp of the latest move to in_progress
    pub const STARTED_AT: &str = "started_at";
    /// Unix timestamp of completion
    pub const COMPLETED_AT: &str = "completed_at";
    /// Unix timestamp of the latest failure
    pub const FAILED_AT: &str = "failed_at";
    /// Number of recorded failures
    pub const FAILED_COUNT: &str = "failed_count";
    /// Captured downloader output on success
    pub const OUTPUT: &str = "output";
    /// Diagnostic text of the latest failure
    pub const ERROR: &str = "error";
}

/// Unique identifier for a job
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a fresh random id (32 lowercase hex characters)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status; also the middle segment of a record key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Claimed from the queue, not yet started
    Pending,
    /// Downloader running or file being delivered
    InProgress,
    /// File delivered to the final root
    Completed,
    /// Download or delivery failed
    Failed,
}

impl JobStatus {
    /// Every status, in lifecycle order
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// The key segment for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether a job in this status is finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown job status: {s}"))
    }
}

/// Address of a job record: `<namespace>:<status>:<job_id>`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobKey {
    /// Key prefix shared by all job records
    pub namespace: String,
    /// Status segment
    pub status: JobStatus,
    /// Job id segment
    pub job_id: JobId,
}

impl JobKey {
    /// Build a key from its parts
    pub fn new(namespace: impl Into<String>, status: JobStatus, job_id: JobId) -> Self {
        Self {
            namespace: namespace.into(),
            status,
            job_id,
        }
    }

    /// The same job under another status
    pub fn with_status(&self, status: JobStatus) -> Self {
        Self {
            namespace: self.namespace.clone(),
            status,
            job_id: self.job_id.clone(),
        }
    }

    /// Prefix shared by every key in one status namespace, trailing separator included
    pub fn status_prefix(namespace: &str, status: JobStatus) -> String {
        format!("{}:{}:", namespace, status.as_str())
    }

    /// Parse a stored key relative to a known namespace
    ///
    /// The namespace may itself contain `:`; the job id is everything after the
    /// status segment.
    pub fn parse(namespace: &str, key: &str) -> Option<Self> {
        let rest = key.strip_prefix(namespace)?.strip_prefix(':')?;
        let (status, job_id) = rest.split_once(':')?;
        if job_id.is_empty() {
            return None;
        }
        Some(Self {
            namespace: namespace.to_string(),
            status: status.parse().ok()?,
            job_id: JobId::from(job_id),
        })
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.status, self.job_id)
    }
}

/// One download unit as produced by probing and carried by the queue
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobSpec {
    /// URL handed to the downloader
    pub url: String,

    /// Downloader options, in order
    #[serde(default)]
    pub options: Vec<String>,

    /// Save directory relative to the staging and final roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savedir: Option<String>,

    /// Advisory display name of the delivered file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Job id supplied upstream; assigned at claim time when absent
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_scalar_id"
    )]
    pub id: Option<String>,

    /// Extractor that produced this entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,

    /// URL the entry was expanded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl JobSpec {
    /// A job for `url` with no options or save directory
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

// Upstream producers send ids as strings or numbers
fn deserialize_scalar_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "job id must be a string or number, got {other}"
            )));
        }
    })
}

/// Typed view of a stored job record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobRecord {
    /// Job id
    pub job_id: JobId,
    /// Status recorded in the fields
    pub status: JobStatus,
    /// Source URL
    pub url: String,
    /// Downloader options
    pub options: Vec<String>,
    /// Save directory
    pub savedir: String,
    /// Display name (empty when none was supplied)
    pub filename: String,
    /// Unix timestamp of the claim
    pub created_at: Option<i64>,
    /// Unix timestamp of the latest start
    pub started_at: Option<i64>,
    /// Unix timestamp of completion
    pub completed_at: Option<i64>,
    /// Unix timestamp of the latest failure
    pub failed_at: Option<i64>,
    /// Number of recorded failures
    pub failed_count: u32,
    /// Captured downloader output
    pub output: Option<String>,
    /// Diagnostic text of the latest failure
    pub error: Option<String>,
}

impl JobRecord {
    /// Decode stored fields; unknown or unparsable values fall back to defaults
    pub fn from_fields(key: &JobKey, fields: &Fields) -> Self {
        let text = |name: &str| fields.get(name).cloned().unwrap_or_default();
        let optional = |name: &str| fields.get(name).filter(|v| !v.is_empty()).cloned();
        let timestamp = |name: &str| fields.get(name).and_then(|v| parse_timestamp(v));

        Self {
            job_id: key.job_id.clone(),
            status: fields
                .get(fields::STATUS)
                .and_then(|s| s.parse().ok())
                .unwrap_or(key.status),
            url: text(fields::URL),
            options: fields
                .get(fields::OPTIONS)
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default(),
            savedir: text(fields::SAVEDIR),
            filename: text(fields::FILENAME),
            created_at: timestamp(fields::CREATED_AT),
            started_at: timestamp(fields::STARTED_AT),
            completed_at: timestamp(fields::COMPLETED_AT),
            failed_at: timestamp(fields::FAILED_AT),
            failed_count: failed_count(fields),
            output: optional(fields::OUTPUT),
            error: optional(fields::ERROR),
        }
    }

    /// The spec this record would be re-run with
    pub fn to_spec(&self) -> JobSpec {
        JobSpec {
            url: self.url.clone(),
            options: self.options.clone(),
            savedir: Some(self.savedir.clone()).filter(|s| !s.is_empty()),
            filename: Some(self.filename.clone()).filter(|s| !s.is_empty()),
            id: Some(self.job_id.0.clone()),
            extractor: None,
            source: None,
        }
    }
}

/// Fields of a freshly claimed job
pub fn pending_fields(spec: &JobSpec, now: i64) -> Fields {
    let mut map = Fields::new();
    map.insert(fields::STATUS.into(), JobStatus::Pending.as_str().into());
    map.insert(fields::URL.into(), spec.url.clone());
    map.insert(
        fields::OPTIONS.into(),
        serde_json::to_string(&spec.options).unwrap_or_else(|_| "[]".to_string()),
    );
    map.insert(
        fields::SAVEDIR.into(),
        spec.savedir.clone().unwrap_or_default(),
    );
    map.insert(
        fields::FILENAME.into(),
        spec.filename.clone().unwrap_or_default(),
    );
    map.insert(fields::CREATED_AT.into(), now.to_string());
    map.insert(fields::FAILED_COUNT.into(), "0".into());
    map
}

/// Failure count of a record; missing or unparsable counts read as zero
pub fn failed_count(fields: &Fields) -> u32 {
    fields
        .get(fields::FAILED_COUNT)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

/// Failure count as the store's counter sees it
///
/// A missing count is zero; `None` means the value is not an integer and the
/// record can't be incremented.
pub fn stored_failed_count(fields: &Fields) -> Option<i64> {
    match fields.get(fields::FAILED_COUNT) {
        Some(raw) => raw.trim().parse::<i64>().ok(),
        None => Some(0),
    }
}

// Timestamps may have been written as fractional seconds by older producers
fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|f| f as i64))
}

/// A request stored for later processing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequestRecord {
    /// Requested URL
    pub url: String,
    /// Downloader options
    #[serde(default)]
    pub options: Vec<String>,
    /// Save directory
    #[serde(default)]
    pub savedir: Option<String>,
}

/// A stored request as shown to API consumers (options withheld)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScheduledRequest {
    /// Requested URL
    pub url: String,
    /// Save directory
    pub savedir: Option<String>,
}

impl From<RequestRecord> for ScheduledRequest {
    fn from(record: RequestRecord) -> Self {
        Self {
            url: record.url,
            savedir: record.savedir,
        }
    }
}

/// Result of one worker activation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkOutcome {
    /// A job reached `completed`
    Completed(JobId),
    /// A job reached `failed`
    Failed(JobId),
    /// Nothing to do before the pop timeout
    NoWork,
    /// A queue payload was dropped: unparsable, or a duplicate of an active job
    Discarded,
}

impl WorkOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkOutcome::Completed(_) | WorkOutcome::Failed(_) | WorkOutcome::NoWork => 0,
            WorkOutcome::Discarded => 1,
        }
    }
}
