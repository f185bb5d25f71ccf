//! Scratch working copies that are removed when the pipeline is done with them.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// What happened to a working copy at the end of a repository's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// Nothing was created, so nothing was removed.
    NotCreated,
    Removed,
    /// Kept on request.
    Skipped,
    Failed(String),
}

impl fmt::Display for CleanupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupOutcome::NotCreated => write!(f, "not created"),
            CleanupOutcome::Removed => write!(f, "removed"),
            CleanupOutcome::Skipped => write!(f, "skipped"),
            CleanupOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Owns a working copy directory and deletes it on release or drop.
#[derive(Debug)]
pub struct WorkingCopy {
    path: PathBuf,
    keep: bool,
    released: bool,
}

impl WorkingCopy {
    pub fn new(path: impl Into<PathBuf>, keep: bool) -> Self {
        Self {
            path: path.into(),
            keep,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now and report what happened.
    pub fn release(mut self) -> CleanupOutcome {
        self.released = true;
        self.remove()
    }

    fn remove(&self) -> CleanupOutcome {
        if self.keep {
            return CleanupOutcome::Skipped;
        }
        if !self.path.exists() {
            return CleanupOutcome::NotCreated;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => CleanupOutcome::Removed,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove working copy");
                CleanupOutcome::Failed(e.to_string())
            }
        }
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if !self.released {
            self.remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp_repo");
        fs::create_dir_all(path.join("nested")).unwrap();
        fs::write(path.join("nested/file.txt"), "x").unwrap();

        let copy = WorkingCopy::new(&path, false);
        assert_eq!(copy.release(), CleanupOutcome::Removed);
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_skips_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp_repo");
        fs::create_dir_all(&path).unwrap();

        assert_eq!(WorkingCopy::new(&path, true).release(), CleanupOutcome::Skipped);
        assert!(path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp_repo");
        fs::create_dir_all(&path).unwrap();

        {
            let _copy = WorkingCopy::new(&path, false);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_directory_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let copy = WorkingCopy::new(dir.path().join("never"), false);
        assert_eq!(copy.release(), CleanupOutcome::NotCreated);
    }
}
