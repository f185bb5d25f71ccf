//! Git commit operations.

use git2::{IndexAddOption, Oid, Signature};

use crate::error::Result;
use crate::git::GitOps;

/// Identity used when the repository and user config define none.
const FALLBACK_NAME: &str = "bitbucket-ops";
const FALLBACK_EMAIL: &str = "bitbucket-ops@automated.local";

/// Commit operations for GitOps.
pub trait CommitOps {
    /// Stage all changes (new, modified, deleted files).
    fn stage_all(&self) -> Result<()>;

    /// Commit the index on top of HEAD.
    fn commit(&self, message: &str) -> Result<Oid>;

    /// Check if the index differs from HEAD.
    fn has_staged_changes(&self) -> Result<bool>;
}

impl CommitOps for GitOps {
    fn stage_all(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<Oid> {
        let signature = self.signature()?;
        let mut index = self.repo.index()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;
        let parent = self.repo.head()?.peel_to_commit()?;

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;
        Ok(oid)
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let head = self.repo.head()?.peel_to_tree()?;
        let diff = self.repo.diff_tree_to_index(Some(&head), None, None)?;
        Ok(diff.deltas().count() > 0)
    }
}

impl GitOps {
    fn signature(&self) -> Result<Signature<'static>> {
        self.repo
            .signature()
            .or_else(|_| Signature::now(FALLBACK_NAME, FALLBACK_EMAIL))
            .map_err(Into::into)
    }
}
