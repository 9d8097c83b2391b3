//! Copying a staged file into the final directory

use crate::error::ReconcileError;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

use super::matching::non_empty_file;

/// How a placement attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Bytes were copied to the destination
    Copied(PathBuf),
    /// A non-empty file was already at the destination and was left untouched
    AlreadyPresent(PathBuf),
}

impl Placement {
    /// Destination path
    pub fn path(&self) -> &Path {
        match self {
            Placement::Copied(path) | Placement::AlreadyPresent(path) => path,
        }
    }
}

fn copy_failed(source: &Path, dest: &Path, reason: impl ToString) -> Error {
    Error::Reconcile(ReconcileError::CopyFailed {
        source_path: source.to_path_buf(),
        dest_path: dest.to_path_buf(),
        reason: reason.to_string(),
    })
}

/// Copy `source` to `dest` without ever exposing a partial file at `dest`
///
/// The bytes land in a hidden sibling first; the size is checked against the
/// source and the sibling is renamed over `dest`. An existing non-empty `dest`
/// is never overwritten.
pub async fn place_file(source: &Path, dest: &Path) -> Result<Placement> {
    if non_empty_file(dest).is_some() {
        return Ok(Placement::AlreadyPresent(dest.to_path_buf()));
    }

    let parent = dest
        .parent()
        .ok_or_else(|| copy_failed(source, dest, "destination has no parent directory"))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| copy_failed(source, dest, e))?;

    let expected = tokio::fs::metadata(source)
        .await
        .map_err(|e| copy_failed(source, dest, e))?
        .len();

    let temp = parent.join(format!(
        ".mediaq-{}.partial",
        uuid::Uuid::new_v4().simple()
    ));
    let result = async {
        tokio::fs::copy(source, &temp)
            .await
            .map_err(|e| copy_failed(source, dest, e))?;

        let actual = tokio::fs::metadata(&temp)
            .await
            .map_err(|e| copy_failed(source, dest, e))?
            .len();
        if actual != expected {
            return Err(Error::Reconcile(ReconcileError::SizeMismatch {
                dest_path: dest.to_path_buf(),
                expected,
                actual,
            }));
        }

        tokio::fs::rename(&temp, dest)
            .await
            .map_err(|e| copy_failed(source, dest, e))?;
        Ok::<(), Error>(())
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }

    Ok(Placement::Copied(dest.to_path_buf()))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copies_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("staged.mp4");
        std::fs::write(&source, b"video bytes").unwrap();
        let dest = dir.path().join("final/sub/Song.mp4");

        let placed = place_file(&source, &dest).await.unwrap();

        assert_eq!(placed, Placement::Copied(dest.clone()));
        assert_eq!(std::fs::read(&dest).unwrap(), b"video bytes");
        assert!(source.exists(), "placement never removes the source");
        let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".mediaq-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_existing_destination_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("staged.mp4");
        let dest = dir.path().join("Song.mp4");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(&dest, b"original").unwrap();

        let placed = place_file(&source, &dest).await.unwrap();

        assert_eq!(placed, Placement::AlreadyPresent(dest.clone()));
        assert_eq!(std::fs::read(&dest).unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_empty_destination_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("staged.mp4");
        let dest = dir.path().join("Song.mp4");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(&dest, b"").unwrap();

        let placed = place_file(&source, &dest).await.unwrap();
        assert!(matches!(placed, Placement::Copied(_)));
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_missing_source_is_copy_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = place_file(&dir.path().join("gone.mp4"), &dir.path().join("x.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Reconcile(ReconcileError::CopyFailed { .. })
        ));
    }
}
