//! Locating the file a job produced

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Which file names count as a finished download for a job
#[derive(Debug, Clone)]
pub struct MatchRules {
    media_extensions: HashSet<String>,
    partial_extensions: HashSet<String>,
}

/// A file that matched, with its size at scan time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Full path of the file
    pub path: PathBuf,
    /// File name component
    pub file_name: String,
    /// Size in bytes when scanned
    pub size: u64,
}

impl MatchRules {
    /// Build rules from extension lists; entries are compared case-insensitively
    /// and may be given with or without a leading dot
    pub fn new(media_extensions: &[String], partial_extensions: &[String]) -> Self {
        let normalize = |list: &[String]| {
            list.iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect()
        };
        Self {
            media_extensions: normalize(media_extensions),
            partial_extensions: normalize(partial_extensions),
        }
    }

    /// Whether `file_name` is a finished media file belonging to `job_id`
    ///
    /// The job id must appear in the name. Everything after its last occurrence
    /// is checked: the final extension must be a media extension and no
    /// dotted segment may be a partial-download marker (`.part`, `.temp.mp4`).
    pub fn matches(&self, file_name: &str, job_id: &str) -> bool {
        if job_id.is_empty() {
            return false;
        }
        let Some(position) = file_name.rfind(job_id) else {
            return false;
        };

        let tail = file_name[position + job_id.len()..].to_lowercase();
        let mut segments = tail.split('.').skip(1).peekable();
        if segments.peek().is_none() {
            return false;
        }

        let mut last = "";
        for segment in segments {
            if self.partial_extensions.contains(segment) {
                return false;
            }
            last = segment;
        }
        self.media_extensions.contains(last)
    }

    /// Media extensions, sorted
    pub fn media_extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.media_extensions.iter().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

fn candidate(path: &Path, metadata: &std::fs::Metadata) -> Option<Candidate> {
    Some(Candidate {
        path: path.to_path_buf(),
        file_name: path.file_name()?.to_str()?.to_string(),
        size: metadata.len(),
    })
}

/// All files under `dir` (recursively) that match `job_id`, sorted by path
///
/// A missing directory yields nothing.
pub fn scan_candidates(dir: &Path, job_id: &str, rules: &MatchRules) -> Vec<Candidate> {
    let mut found: Vec<Candidate> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| rules.matches(name, job_id))
        })
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            candidate(entry.path(), &metadata)
        })
        .collect();
    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}

/// The candidate to deliver: the largest non-empty match
///
/// Zero-byte files are still being written and never qualify.
pub fn pick_candidate(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates
        .into_iter()
        .filter(|c| c.size > 0)
        .reduce(|best, next| if next.size > best.size { next } else { best })
}

/// A non-empty regular file at `path`
pub fn non_empty_file(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|metadata| metadata.is_file() && metadata.len() > 0)
        .map(|metadata| metadata.len())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> MatchRules {
        let media: Vec<String> = ["mp4", "mkv", "webm", "m4a", "mp3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let partial: Vec<String> = ["part", "ytdl", ".temp", "tmp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        MatchRules::new(&media, &partial)
    }

    #[test]
    fn test_matches_on_job_id_and_media_extension() {
        let rules = rules();
        assert!(rules.matches("Some Title [abc123].mp4", "abc123"));
        assert!(rules.matches("Some Title [abc123].MKV", "abc123"));
        assert!(rules.matches("abc123.m4a", "abc123"));
        assert!(!rules.matches("Some Title [zzz999].mp4", "abc123"));
        assert!(!rules.matches("Some Title [abc123].jpg", "abc123"));
        assert!(!rules.matches("Some Title [abc123]", "abc123"));
        assert!(!rules.matches("anything.mp4", ""));
    }

    #[test]
    fn test_partial_downloads_never_match() {
        let rules = rules();
        assert!(!rules.matches("Title [abc123].mp4.part", "abc123"));
        assert!(!rules.matches("Title [abc123].mp4.ytdl", "abc123"));
        assert!(!rules.matches("Title [abc123].temp.mp4", "abc123"));
        assert!(!rules.matches("Title [abc123].f137.mp4.part", "abc123"));
    }

    #[test]
    fn test_dots_in_title_before_the_job_id_are_ignored() {
        assert!(rules().matches("v1.part.two [abc123].webm", "abc123"));
    }

    #[test]
    fn test_scan_is_recursive_and_ignores_other_jobs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/A [abc123].mp4"), b"data").unwrap();
        std::fs::write(dir.path().join("B [other].mp4"), b"data").unwrap();
        std::fs::write(dir.path().join("A [abc123].mp4.part"), b"data").unwrap();

        let found = scan_candidates(dir.path(), "abc123", &rules());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name, "A [abc123].mp4");
        assert_eq!(found[0].size, 4);

        assert!(scan_candidates(&dir.path().join("missing"), "abc123", &rules()).is_empty());
    }

    #[test]
    fn test_pick_skips_empty_and_prefers_largest() {
        let make = |name: &str, size: u64| Candidate {
            path: PathBuf::from(name),
            file_name: name.to_string(),
            size,
        };

        assert_eq!(pick_candidate(vec![make("a.mp4", 0)]), None);
        assert_eq!(
            pick_candidate(vec![make("a.mp4", 0), make("b.mkv", 10), make("c.mp4", 3)])
                .unwrap()
                .file_name,
            "b.mkv"
        );
    }
}
