//! Group audit through the legacy 1.0 groups endpoint.

use serde::{Deserialize, Serialize};

use crate::audit::Auditor;
use crate::bitbucket::{Pagination, segment};
use crate::error::Result;

/// One group in the audit report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub name: String,
    pub slug: String,
    pub members: Vec<Member>,
}

/// A member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub account_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiGroup {
    name: String,
    slug: String,
    #[serde(default)]
    members: Vec<Member>,
}

impl From<ApiGroup> for GroupRecord {
    fn from(group: ApiGroup) -> Self {
        Self {
            name: group.name,
            slug: group.slug,
            members: group.members,
        }
    }
}

impl Auditor<'_> {
    /// List every group in the workspace with its members.
    pub fn groups(&self) -> Result<Vec<GroupRecord>> {
        let endpoint = format!("/1.0/groups/{}", segment(&self.workspace));
        let groups = self
            .client
            .collect_as::<ApiGroup>(&endpoint, Pagination::Flat)?;
        Ok(groups.into_iter().map(GroupRecord::from).collect())
    }
}
