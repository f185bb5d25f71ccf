//! Source-control operations for the bulk change workflow.
//!
//! Thin git2 wrappers for cloning, branching, committing and pushing a working copy.
//!
//! # Example
//!
//! ```rust,no_run
//! use bitbucket_ops::git::{BranchOps, CommitOps, GitAuth, GitOps, PushOps};
//!
//! let auth = GitAuth::ssh_default();
//! let git = GitOps::clone_repository("git@bitbucket.org:acme/network.git", "tmp_network", auth)?;
//!
//! git.create_and_checkout("feature/update-module-reference")?;
//! // ... make changes ...
//! git.stage_all()?;
//! git.commit("Updating module references")?;
//! git.push_with_upstream("origin", "feature/update-module-reference")?;
//! # Ok::<(), bitbucket_ops::error::BitbucketError>(())
//! ```

mod auth;
mod branch;
mod commit;
mod push;

pub use auth::GitAuth;
pub use branch::BranchOps;
pub use commit::CommitOps;
pub use push::PushOps;

use git2::build::RepoBuilder;
use git2::{ErrorClass, ErrorCode, FetchOptions, Repository};
use std::path::Path;

use crate::error::{BitbucketError, Result};

/// An opened working copy plus the authentication used for its remotes.
pub struct GitOps {
    repo: Repository,
    auth: GitAuth,
}

impl GitOps {
    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::open(path.as_ref())?;
        Ok(Self {
            repo,
            auth: GitAuth::default(),
        })
    }

    /// Clone `url` into `path`, which must not exist yet.
    pub fn clone_repository(url: &str, path: impl AsRef<Path>, auth: GitAuth) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(BitbucketError::WorkDirExists(path.to_path_buf()));
        }

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(auth.callbacks());

        let repo = RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(url, path)
            .map_err(|e| {
                remote_error(e, |message| BitbucketError::CloneError {
                    repo: url.to_string(),
                    message,
                })
            })?;

        Ok(Self { repo, auth })
    }

    /// Get a reference to the underlying git2::Repository.
    pub fn repo(&self) -> &Repository {
        &self.repo
    }
}

/// Classify a failed remote operation, separating rejected credentials from other failures.
pub(crate) fn remote_error(
    err: git2::Error,
    otherwise: impl FnOnce(String) -> BitbucketError,
) -> BitbucketError {
    let message = err.message().to_string();
    if err.code() == ErrorCode::Auth || err.class() == ErrorClass::Ssh {
        BitbucketError::GitAuth { message }
    } else {
        otherwise(message)
    }
}
