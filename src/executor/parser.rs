//! Parsing of downloader output

use crate::types::JobSpec;
use serde_json::Value;
use std::str;

/// Exit status of an external command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The command exited successfully (exit code 0)
    Success,
    /// The command exited with a non-zero exit code
    Failure,
}

impl ExitStatus {
    /// Returns `true` if the exit status represents success
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for ExitStatus {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Text to record for a failed run: stderr, else stdout, else the exit description
pub fn failure_diagnostic(stdout: &[u8], stderr: &[u8], exit_description: &str) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim_end().to_string();
    }
    let stdout = String::from_utf8_lossy(stdout);
    if !stdout.trim().is_empty() {
        return stdout.trim_end().to_string();
    }
    exit_description.to_string()
}

fn non_empty_str<'a>(entry: &'a Value, field: &str) -> Option<&'a str> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Build job specs from `-j --flat-playlist` output: one JSON object per line
///
/// More than one object is a playlist and yields one spec per entry that has a
/// URL; entries without one are skipped. A single object yields one spec for
/// its page URL. No output at all yields one spec for the requested URL.
pub fn parse_probe_output(
    stdout: &[u8],
    requested_url: &str,
    options: &[String],
    savedir: Option<&str>,
) -> crate::Result<Vec<JobSpec>> {
    let text = str::from_utf8(stdout)
        .map_err(|e| crate::Error::Probe(format!("probe output is not UTF-8: {}", e)))?;

    let objects = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str::<Value>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| crate::Error::Probe(format!("failed to parse probe output: {}", e)))?;

    let spec = |url: &str, filename: Option<&str>| JobSpec {
        url: url.to_string(),
        options: options.to_vec(),
        savedir: savedir.map(str::to_string),
        filename: filename.map(str::to_string),
        ..Default::default()
    };

    if objects.len() > 1 {
        let mut specs = Vec::with_capacity(objects.len());
        for entry in objects.iter().filter(|entry| entry.is_object()) {
            let Some(url) =
                non_empty_str(entry, "webpage_url").or_else(|| non_empty_str(entry, "url"))
            else {
                tracing::warn!(
                    source = requested_url,
                    entry_id = ?entry.get("id"),
                    "skipping playlist entry without a URL"
                );
                continue;
            };

            let mut job = spec(url, non_empty_str(entry, "title"));
            job.extractor = non_empty_str(entry, "ie_key")
                .or_else(|| non_empty_str(entry, "extractor"))
                .map(str::to_string);
            job.source = Some(requested_url.to_string());
            specs.push(job);
        }
        return Ok(specs);
    }

    match objects.first().filter(|info| info.is_object()) {
        Some(info) => {
            let url = non_empty_str(info, "webpage_url")
                .or_else(|| non_empty_str(info, "url"))
                .unwrap_or(requested_url);
            Ok(vec![spec(url, non_empty_str(info, "title"))])
        }
        None => Ok(vec![spec(requested_url, None)]),
    }
}
