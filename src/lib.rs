//! # Bitbucket Ops
//!
//! Operator tooling for Bitbucket Cloud and Bitbucket Server.
//!
//! This crate provides:
//! - An authenticated REST client with explicit pagination strategies
//! - A workspace auditor for groups, repositories, projects and their permissions
//! - A single-repository inspector for Bitbucket Server settings
//! - Project provisioning with collision-free key generation
//! - Bulk find/replace across repositories, delivered as pull requests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bitbucket_ops::prelude::*;
//!
//! let credentials = Credentials::from_env_or_prompt(CLOUD_ENV, "Bitbucket cloud")?;
//! let client = BitbucketClient::new("https://api.bitbucket.org", credentials)?;
//!
//! let report = Auditor::new(&client, "acme")
//!     .with_policy(FailurePolicy::KeepGoing)
//!     .run()?;
//! println!("{}", report.to_yaml()?);
//! # Ok::<(), bitbucket_ops::error::BitbucketError>(())
//! ```
//!
//! ## Bulk Replace
//!
//! ```rust,no_run
//! use bitbucket_ops::prelude::*;
//!
//! # let client = BitbucketClient::new("https://api.bitbucket.org", Credentials::new("a", "b"))?;
//! let result = CodeReplace::new("acme", "old-module", "old-module", "new-module")?
//!     .git_auth(GitAuth::ssh_default())
//!     .execute(&client)?;
//!
//! for repo in &result.repo_results {
//!     println!("{}: {}", repo.repository, repo.status);
//! }
//! # Ok::<(), bitbucket_ops::error::BitbucketError>(())
//! ```

pub mod audit;
pub mod bitbucket;
pub mod codemod;
pub mod credentials;
pub mod error;
pub mod git;
pub mod inspect;
pub mod prompt;
pub mod provision;
pub mod settings;
pub mod telemetry;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::audit::{AuditReport, Auditor, FailurePolicy};
    pub use crate::bitbucket::{
        BitbucketClient, CreatePullRequest, Pagination, ProjectOps, PullRequest, PullRequestOps,
        SearchOps,
    };
    pub use crate::codemod::{CodeReplace, CodeReplaceResult, RepoResult, RepoStatus};
    pub use crate::credentials::{CLOUD_ENV, Credentials, SERVER_ENV};
    pub use crate::error::{BitbucketError, Result};
    pub use crate::git::{BranchOps, CommitOps, GitAuth, GitOps, PushOps};
    pub use crate::inspect::{Inspection, RepositoryInspector};
    pub use crate::provision::{ProvisionReport, ProvisionState, Provisioner};
    pub use crate::settings::Settings;
}
