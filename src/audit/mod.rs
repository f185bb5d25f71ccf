//! Workspace audit of repositories, projects and groups.
//!
//! The auditor walks the Bitbucket Cloud listing endpoints, attaches the groups that hold
//! explicit permissions on each repository and project, and assembles an [`AuditReport`]
//! that renders as YAML with the top-level keys `groups`, `repositories` and `projects`.
//!
//! # Example
//!
//! ```rust,no_run
//! use bitbucket_ops::audit::Auditor;
//! use bitbucket_ops::bitbucket::BitbucketClient;
//! use bitbucket_ops::credentials::Credentials;
//!
//! let client = BitbucketClient::new(
//!     "https://api.bitbucket.org",
//!     Credentials::new("alice", "app-password"),
//! )?;
//! let report = Auditor::new(&client, "acme").run()?;
//! report.write_yaml("output.yaml")?;
//! # Ok::<(), bitbucket_ops::error::BitbucketError>(())
//! ```

mod groups;
mod projects;
mod repositories;

pub use groups::{GroupRecord, Member};
pub use projects::ProjectRecord;
pub use repositories::RepositoryRecord;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bitbucket::{BitbucketClient, Pagination};
use crate::error::{BitbucketError, Result};

/// A group holding an explicit permission on a repository or project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPermission {
    pub slug: String,
    pub permission: String,
}

#[derive(Debug, Deserialize)]
struct ApiGroupPermission {
    group: ApiGroupRef,
    permission: String,
}

#[derive(Debug, Deserialize)]
struct ApiGroupRef {
    slug: String,
}

impl From<ApiGroupPermission> for GroupPermission {
    fn from(p: ApiGroupPermission) -> Self {
        Self {
            slug: p.group.slug,
            permission: p.permission,
        }
    }
}

/// What to do when the nested permission lookup of one resource fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the whole audit.
    #[default]
    Abort,
    /// Record the failure, keep the resource with an empty group list, continue.
    KeepGoing,
}

/// A resource whose permissions could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFailure {
    pub resource: String,
    pub error: String,
}

/// Records assembled from one listing, plus any per-resource failures.
#[derive(Debug, Clone)]
pub struct Audited<T> {
    pub records: Vec<T>,
    pub failures: Vec<AuditFailure>,
}

/// The complete audit document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub groups: Vec<GroupRecord>,
    pub repositories: Vec<RepositoryRecord>,
    pub projects: Vec<ProjectRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<AuditFailure>,
}

impl AuditReport {
    /// Render the report as YAML, keys in declaration order.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the YAML report to `path`.
    pub fn write_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = self.to_yaml()?;
        std::fs::write(path.as_ref(), content).map_err(|e| {
            BitbucketError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write report {}: {}", path.as_ref().display(), e),
            ))
        })
    }
}

/// Audits a single Bitbucket Cloud workspace.
pub struct Auditor<'a> {
    client: &'a BitbucketClient,
    workspace: String,
    policy: FailurePolicy,
}

impl<'a> Auditor<'a> {
    pub fn new(client: &'a BitbucketClient, workspace: impl Into<String>) -> Self {
        Self {
            client,
            workspace: workspace.into(),
            policy: FailurePolicy::Abort,
        }
    }

    /// Set the policy for nested permission lookups that fail.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// Audit groups, repositories and projects, in that order.
    pub fn run(&self) -> Result<AuditReport> {
        let groups = self.groups()?;
        let repositories = self.repositories()?;
        let projects = self.projects()?;

        let mut errors = repositories.failures;
        errors.extend(projects.failures);

        Ok(AuditReport {
            groups,
            repositories: repositories.records,
            projects: projects.records,
            errors,
        })
    }

    /// Collect the `{slug, permission}` edges of one resource's permissions endpoint.
    ///
    /// Under [`FailurePolicy::KeepGoing`] a failed lookup yields no edges and is pushed onto
    /// `failures`; credential rejections always abort.
    fn group_permissions(
        &self,
        resource: &str,
        endpoint: &str,
        failures: &mut Vec<AuditFailure>,
    ) -> Result<Vec<GroupPermission>> {
        match self
            .client
            .collect_as::<ApiGroupPermission>(endpoint, Pagination::NextUrl)
        {
            Ok(permissions) => Ok(permissions.into_iter().map(GroupPermission::from).collect()),
            Err(e) if self.policy == FailurePolicy::KeepGoing && !e.is_auth_failure() => {
                tracing::warn!(resource, error = %e, "failed to read group permissions");
                failures.push(AuditFailure {
                    resource: resource.to_string(),
                    error: e.to_string(),
                });
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
