//! Pull request operations.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::bitbucket::BitbucketClient;
use crate::bitbucket::client::segment;
use crate::error::{BitbucketError, Result};

/// A pull request on Bitbucket Cloud.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub links: PullRequestLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestLinks {
    pub html: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

impl PullRequest {
    /// The web URL of the pull request, if the API returned one.
    pub fn html_url(&self) -> Option<&str> {
        self.links.html.as_ref().map(|l| l.href.as_str())
    }
}

/// Request body for creating a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePullRequest {
    pub title: String,
    pub description: String,
    pub source: BranchRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<BranchRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchRef {
    pub branch: BranchName,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchName {
    pub name: String,
}

impl BranchRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            branch: BranchName { name: name.into() },
        }
    }
}

impl CreatePullRequest {
    /// Create a pull request from `source_branch` into the repository's main branch.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        source_branch: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            source: BranchRef::new(source_branch),
            destination: None,
        }
    }

    /// Target a branch other than the repository's main branch.
    pub fn into_branch(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(BranchRef::new(destination));
        self
    }
}

/// Pull request operations.
pub trait PullRequestOps {
    /// Create a new pull request. Succeeds only on 201 Created.
    fn create_pull_request(
        &self,
        workspace: &str,
        repository: &str,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest>;
}

impl PullRequestOps for BitbucketClient {
    fn create_pull_request(
        &self,
        workspace: &str,
        repository: &str,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let endpoint = format!(
            "/2.0/repositories/{}/{}/pullrequests",
            segment(workspace),
            segment(repository)
        );
        let value = self.post_json(&endpoint, pr, StatusCode::CREATED)?;
        serde_json::from_value(value).map_err(|e| BitbucketError::UnexpectedResponse {
            endpoint,
            message: format!("Failed to parse pull request: {}", e),
        })
    }
}
