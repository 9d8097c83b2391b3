//! Filename and path helpers for delivered files, plus poll deadlines
//!
//! Display names come from remote metadata and may contain anything. Before one
//! becomes part of a path it is normalized to NFC, stripped of characters that
//! are unsafe on common filesystems, and cut to fit a byte budget.

use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::time::Instant;
use unicode_normalization::UnicodeNormalization;

/// Marker appended to a display name that had to be shortened
pub const ELLIPSIS: &str = "...";

// Path separators, shell/Windows reserved characters, and control characters
#[allow(clippy::expect_used)]
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\\/¥:*?"<>|\x00-\x1f\x7f]"#).expect("unsafe character pattern is valid")
});

// Unicode-aware, so ideographic spaces (U+3000) collapse too
#[allow(clippy::expect_used)]
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

// Stand-in for "never" when a configured timeout doesn't fit in an Instant
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// The instant `timeout` from now, capped when the sum would overflow
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Normalize a display name into a single safe path component
///
/// Applies canonical composition, replaces unsafe characters with `_`, collapses
/// whitespace runs into one space and trims. Returns an empty string when
/// nothing usable is left (including the names `.` and `..`).
///
/// # Examples
///
/// ```
/// use mediaq::utils::normalize_display_name;
///
/// assert_eq!(normalize_display_name("  AC/DC:  Live\u{3000}Set "), "AC_DC_ Live Set");
/// ```
pub fn normalize_display_name(raw: &str) -> String {
    let composed: String = raw.nfc().collect();
    let replaced = UNSAFE_CHARS.replace_all(&composed, "_");
    let collapsed = WHITESPACE_RUN.replace_all(&replaced, " ");
    let trimmed = collapsed.trim();

    if trimmed == "." || trimmed == ".." {
        return String::new();
    }
    trimmed.to_string()
}

/// Sanitize a requested save directory into one path component
///
/// Ideographic spaces are dropped outright rather than turned into spaces.
pub fn sanitize_savedir(raw: &str) -> String {
    normalize_display_name(&raw.replace('\u{3000}', ""))
}

/// Check that a save directory stays inside whatever root it is joined to
///
/// Empty is allowed (the root itself). Absolute paths, `..` and prefixes are not.
pub fn is_safe_relative(savedir: &str) -> bool {
    Path::new(savedir)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Largest index `<= index` that falls on a char boundary of `s`
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut boundary = index;
    while !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

/// Fit `base + extension` into `max_bytes` of UTF-8
///
/// Truncation counts encoded bytes, never splits a character, and marks the
/// cut with [`ELLIPSIS`] before the extension. When nothing of `base`
/// survives, `placeholder` is used instead. `extension` includes its leading dot.
pub fn truncate_to_byte_budget(
    base: &str,
    extension: &str,
    max_bytes: usize,
    placeholder: &str,
) -> String {
    let budget = max_bytes.saturating_sub(extension.len());

    if !base.is_empty() && base.len() <= budget {
        return format!("{base}{extension}");
    }

    if !base.is_empty() {
        let keep = floor_char_boundary(base, budget.saturating_sub(ELLIPSIS.len()));
        let kept = base[..keep].trim_end();
        if !kept.is_empty() {
            return format!("{kept}{ELLIPSIS}{extension}");
        }
    }

    let keep = floor_char_boundary(placeholder, budget);
    format!("{}{extension}", &placeholder[..keep])
}

/// Extension of a file name including the dot, or empty when there is none
pub fn dotted_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Name the delivered file gets in the final directory
///
/// With a display name, the normalized display name plus the staged file's
/// extension, fitted to `max_bytes`. Without one, the staged file name unchanged.
pub fn destination_name(
    display_name: Option<&str>,
    staged_name: &str,
    max_bytes: usize,
    placeholder: &str,
) -> String {
    match display_name.filter(|name| !name.trim().is_empty()) {
        Some(display) => truncate_to_byte_budget(
            &normalize_display_name(display),
            &dotted_extension(staged_name),
            max_bytes,
            placeholder,
        ),
        None => staged_name.to_string(),
    }
}
