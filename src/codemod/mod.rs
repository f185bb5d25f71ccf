//! Bulk find/replace across every repository a code search returns.
//!
//! Each matching repository is cloned, edited on a feature branch, committed, pushed and
//! offered back as a pull request. Repositories are processed one after another; a failing
//! repository is recorded and the run moves on.
//!
//! # Example
//!
//! ```rust,no_run
//! use bitbucket_ops::bitbucket::BitbucketClient;
//! use bitbucket_ops::codemod::CodeReplace;
//! use bitbucket_ops::credentials::Credentials;
//!
//! let client = BitbucketClient::new(
//!     "https://api.bitbucket.org",
//!     Credentials::new("alice", "app-password"),
//! )?;
//!
//! let result = CodeReplace::new("acme", "old-module", "old-module", "new-module")?
//!     .on_branch("feature/update-module-reference")
//!     .create_pr("Updating module references", "Automated reference update")
//!     .execute(&client)?;
//!
//! println!("Changed {} repositories", result.summary.changed_repos);
//! # Ok::<(), bitbucket_ops::error::BitbucketError>(())
//! ```

mod executor;
mod replace;
mod workdir;

pub use executor::{
    CodeReplaceExecutor, CodeReplaceResult, CodeReplaceSummary, MutationStep, ReportEntry,
    RepoResult, RepoStatus,
};
pub use replace::{ReplaceStats, replace_bytes, replace_in_tree};
pub use workdir::{CleanupOutcome, WorkingCopy};

use std::path::PathBuf;

use crate::bitbucket::{PullRequestOps, SearchOps};
use crate::error::{BitbucketError, Result};
use crate::git::GitAuth;

pub const DEFAULT_BRANCH: &str = "feature/update-module-reference";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Updating module references";
pub const DEFAULT_PR_TITLE: &str = "Updating module references";
/// `{workspace}` and `{repository}` are substituted per repository.
pub const DEFAULT_CLONE_URL: &str = "git@bitbucket.org:{workspace}/{repository}.git";

/// Configuration for one bulk replace run.
#[derive(Debug, Clone)]
pub struct CodeReplace {
    pub(crate) workspace: String,
    pub(crate) query: String,
    pub(crate) search: Vec<u8>,
    pub(crate) replace: Vec<u8>,
    pub(crate) branch: String,
    pub(crate) commit_message: String,
    pub(crate) pr_title: String,
    pub(crate) pr_description: String,
    pub(crate) clone_url: String,
    pub(crate) work_dir: PathBuf,
    pub(crate) git_auth: GitAuth,
    pub(crate) interactive: bool,
    pub(crate) keep_worktrees: bool,
}

impl CodeReplace {
    /// Replace `search` with `replace` in every repository of `workspace` matching `query`.
    ///
    /// Fails when `search` is empty.
    pub fn new(
        workspace: impl Into<String>,
        query: impl Into<String>,
        search: impl Into<Vec<u8>>,
        replace: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        let search = search.into();
        if search.is_empty() {
            return Err(BitbucketError::InvalidConfig(
                "search string must not be empty".into(),
            ));
        }

        Ok(Self {
            workspace: workspace.into(),
            query: query.into(),
            search,
            replace: replace.into(),
            branch: DEFAULT_BRANCH.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            pr_title: DEFAULT_PR_TITLE.to_string(),
            pr_description: String::new(),
            clone_url: DEFAULT_CLONE_URL.to_string(),
            work_dir: PathBuf::from("."),
            git_auth: GitAuth::default(),
            interactive: false,
            keep_worktrees: false,
        })
    }

    /// Set the feature branch the change is committed to.
    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    /// Set the pull request title and description.
    pub fn create_pr(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.pr_title = title.into();
        self.pr_description = description.into();
        self
    }

    /// Set the clone URL template.
    pub fn clone_url(mut self, template: impl Into<String>) -> Self {
        self.clone_url = template.into();
        self
    }

    /// Directory the `tmp_{repository}` working copies are created in.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn git_auth(mut self, auth: GitAuth) -> Self {
        self.git_auth = auth;
        self
    }

    /// Pause for confirmation after each repository.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Leave working copies on disk after processing.
    pub fn keep_worktrees(mut self, keep: bool) -> Self {
        self.keep_worktrees = keep;
        self
    }

    /// The clone URL for one repository.
    pub fn clone_url_for(&self, repository: &str) -> String {
        self.clone_url
            .replace("{workspace}", &self.workspace)
            .replace("{repository}", repository)
    }

    /// The working copy path for one repository.
    pub fn work_path_for(&self, repository: &str) -> PathBuf {
        self.work_dir.join(format!("tmp_{repository}"))
    }

    /// Run the whole workflow against `client`.
    pub fn execute<C>(self, client: &C) -> Result<CodeReplaceResult>
    where
        C: SearchOps + PullRequestOps + ?Sized,
    {
        CodeReplaceExecutor::new(self, client).execute()
    }

    /// Like [`CodeReplace::execute`], reporting each repository to `observer` as it finishes.
    pub fn execute_with<C>(
        self,
        client: &C,
        observer: impl FnMut(&RepoResult),
    ) -> Result<CodeReplaceResult>
    where
        C: SearchOps + PullRequestOps + ?Sized,
    {
        CodeReplaceExecutor::new(self, client).execute_with(observer)
    }
}
