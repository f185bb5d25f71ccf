//! Project and group provisioning calls against Bitbucket Cloud.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::bitbucket::BitbucketClient;
use crate::bitbucket::client::segment;
use crate::error::{BitbucketError, Result};

/// A project as returned by the create call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedProject {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

/// A group as returned by the legacy group-create call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedGroup {
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
struct NewProject<'a> {
    name: &'a str,
    key: &'a str,
}

#[derive(Debug, Serialize)]
struct PermissionUpdate<'a> {
    permission: &'a str,
}

/// Project and group operations used by provisioning.
pub trait ProjectOps {
    /// Check whether a project key is taken: 200 means yes, 404 means no.
    ///
    /// Any other status is returned as an error rather than guessed at.
    fn project_exists(&self, workspace: &str, key: &str) -> Result<bool>;

    /// Create a project. Succeeds only on 201 Created.
    fn create_project(&self, workspace: &str, name: &str, key: &str) -> Result<CreatedProject>;

    /// Create a workspace group through the 1.0 API. Succeeds only on 200.
    fn create_group(&self, workspace: &str, name: &str) -> Result<CreatedGroup>;

    /// Grant a group a permission (`read`, `write`, `create-repo`, `admin`) on a project.
    fn set_project_group_permission(
        &self,
        workspace: &str,
        project_key: &str,
        group_slug: &str,
        permission: &str,
    ) -> Result<()>;
}

impl ProjectOps for BitbucketClient {
    fn project_exists(&self, workspace: &str, key: &str) -> Result<bool> {
        let endpoint = format!(
            "/2.0/workspaces/{}/projects/{}",
            segment(workspace),
            segment(key)
        );
        let (status, body) = self.probe(&endpoint)?;
        match status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(BitbucketError::Api {
                status: other.as_u16(),
                body,
            }),
        }
    }

    fn create_project(&self, workspace: &str, name: &str, key: &str) -> Result<CreatedProject> {
        let endpoint = format!("/2.0/workspaces/{}/projects", segment(workspace));
        let value = self.post_json(&endpoint, &NewProject { name, key }, StatusCode::CREATED)?;
        serde_json::from_value(value).map_err(|e| BitbucketError::UnexpectedResponse {
            endpoint,
            message: format!("Failed to parse created project: {}", e),
        })
    }

    fn create_group(&self, workspace: &str, name: &str) -> Result<CreatedGroup> {
        let endpoint = format!("/1.0/groups/{}", segment(workspace));
        let value = self.post_form(&endpoint, &[("name", name)], StatusCode::OK)?;
        serde_json::from_value(value).map_err(|e| BitbucketError::UnexpectedResponse {
            endpoint,
            message: format!("Failed to parse created group: {}", e),
        })
    }

    fn set_project_group_permission(
        &self,
        workspace: &str,
        project_key: &str,
        group_slug: &str,
        permission: &str,
    ) -> Result<()> {
        let endpoint = format!(
            "/2.0/workspaces/{}/projects/{}/permissions-config/groups/{}",
            segment(workspace),
            segment(project_key),
            segment(group_slug)
        );
        self.put_json(&endpoint, &PermissionUpdate { permission }, StatusCode::OK)?;
        Ok(())
    }
}
