//! Repository audit.

use serde::{Deserialize, Serialize};

use crate::audit::{Audited, Auditor, GroupPermission};
use crate::bitbucket::{Pagination, segment};
use crate::error::Result;

/// One repository in the audit report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRecord {
    pub slug: String,
    pub description: String,
    /// Absent for repositories without any commits.
    pub main_branchname: Option<String>,
    pub is_private: bool,
    pub project_key: Option<String>,
    pub groups: Vec<GroupPermission>,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    slug: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    mainbranch: Option<ApiBranch>,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    project: Option<ApiProjectRef>,
}

#[derive(Debug, Deserialize)]
struct ApiBranch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiProjectRef {
    key: String,
}

impl From<ApiRepository> for RepositoryRecord {
    fn from(repo: ApiRepository) -> Self {
        Self {
            slug: repo.slug,
            description: repo.description.unwrap_or_default(),
            main_branchname: repo.mainbranch.map(|b| b.name),
            is_private: repo.is_private,
            project_key: repo.project.map(|p| p.key),
            groups: Vec::new(),
        }
    }
}

impl Auditor<'_> {
    /// List every repository in the workspace with its group permissions, in API order.
    pub fn repositories(&self) -> Result<Audited<RepositoryRecord>> {
        let workspace = segment(&self.workspace);
        let endpoint = format!("/2.0/repositories/{}?pagelen=100", workspace);
        let repositories = self
            .client
            .collect_as::<ApiRepository>(&endpoint, Pagination::NextUrl)?;

        let mut records = Vec::with_capacity(repositories.len());
        let mut failures = Vec::new();

        for repository in repositories {
            let mut record = RepositoryRecord::from(repository);
            let permissions_endpoint = format!(
                "/2.0/repositories/{}/{}/permissions-config/groups?pagelen=100",
                workspace,
                segment(&record.slug)
            );
            record.groups = self.group_permissions(
                &format!("repository {}", record.slug),
                &permissions_endpoint,
                &mut failures,
            )?;
            records.push(record);
        }

        tracing::debug!(count = records.len(), "audited repositories");
        Ok(Audited { records, failures })
    }
}
