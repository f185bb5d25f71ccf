//! Project audit.

use serde::{Deserialize, Serialize};

use crate::audit::{Audited, Auditor, GroupPermission};
use crate::bitbucket::{Pagination, segment};
use crate::error::Result;

/// One project in the audit report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRecord {
    pub name: String,
    pub key: String,
    pub description: String,
    pub groups: Vec<GroupPermission>,
}

#[derive(Debug, Deserialize)]
struct ApiProject {
    name: String,
    key: String,
    #[serde(default)]
    description: Option<String>,
}

impl Auditor<'_> {
    /// List every project in the workspace with its group permissions, in API order.
    pub fn projects(&self) -> Result<Audited<ProjectRecord>> {
        let workspace = segment(&self.workspace);
        let endpoint = format!("/2.0/workspaces/{}/projects?pagelen=100", workspace);
        let projects = self
            .client
            .collect_as::<ApiProject>(&endpoint, Pagination::NextUrl)?;

        let mut records = Vec::with_capacity(projects.len());
        let mut failures = Vec::new();

        for project in projects {
            let permissions_endpoint = format!(
                "/2.0/workspaces/{}/projects/{}/permissions-config/groups?pagelen=100",
                workspace,
                segment(&project.key)
            );
            let groups = self.group_permissions(
                &format!("project {}", project.key),
                &permissions_endpoint,
                &mut failures,
            )?;
            records.push(ProjectRecord {
                name: project.name,
                key: project.key,
                description: project.description.unwrap_or_default(),
                groups,
            });
        }

        tracing::debug!(count = records.len(), "audited projects");
        Ok(Audited { records, failures })
    }
}
