//! Single-repository inspection against Bitbucket Server.
//!
//! Reads the default reviewers, the pull-request merge checks and the branch restrictions of
//! one repository. The three reads are independent: each result is kept separately so a
//! failure in one still lets the others be reported.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::bitbucket::{BitbucketClient, Pagination, segment};
use crate::error::{BitbucketError, Result};

/// A default reviewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewer {
    pub name: String,
    pub email: String,
}

/// Pull-request merge checks of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeChecks {
    /// Block merging while a reviewer has marked "needs work".
    pub needs_work: bool,
    pub required_all_approvers: bool,
    pub required_all_tasks_complete: bool,
    pub required_approvers: u64,
    pub required_successful_builds: u64,
}

impl MergeChecks {
    /// Labelled values in display order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("No \"needs work\" status", self.needs_work.to_string()),
            ("All reviewers approve", self.required_all_approvers.to_string()),
            ("No incomplete tasks", self.required_all_tasks_complete.to_string()),
            ("Minimum approvals", self.required_approvers.to_string()),
            (
                "Minimum successful builds",
                self.required_successful_builds.to_string(),
            ),
        ]
    }
}

/// Branch matcher id mapped to the distinct restriction types applied to it.
///
/// Keys are sorted; restriction types keep the order in which they were first seen.
pub type BranchRestrictions = BTreeMap<String, Vec<String>>;

#[derive(Debug, Deserialize)]
struct ApiCondition {
    #[serde(default)]
    reviewers: Vec<ApiReviewer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReviewer {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    email_address: String,
}

/// One entry of the branch-permissions restrictions endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiRestriction {
    #[serde(rename = "type")]
    pub kind: String,
    pub matcher: ApiMatcher,
}

#[derive(Debug, Deserialize)]
pub struct ApiMatcher {
    pub id: String,
}

/// Fold restrictions into a [`BranchRestrictions`] map, collapsing repeated
/// (branch, type) pairs.
pub fn reduce_restrictions(
    restrictions: impl IntoIterator<Item = ApiRestriction>,
) -> BranchRestrictions {
    let mut map = BranchRestrictions::new();
    for restriction in restrictions {
        let kinds = map.entry(restriction.matcher.id).or_default();
        if !kinds.contains(&restriction.kind) {
            kinds.push(restriction.kind);
        }
    }
    map
}

/// The outcome of inspecting one repository.
#[derive(Debug)]
pub struct Inspection {
    pub project: String,
    pub repository: String,
    pub default_reviewers: Result<Vec<Reviewer>>,
    pub merge_checks: Result<MergeChecks>,
    pub branch_restrictions: Result<BranchRestrictions>,
}

impl Inspection {
    /// True if every read succeeded.
    pub fn is_complete(&self) -> bool {
        self.default_reviewers.is_ok()
            && self.merge_checks.is_ok()
            && self.branch_restrictions.is_ok()
    }

    /// Render the human-readable report, ending with the branch restrictions as YAML.
    pub fn render(&self) -> String {
        let mut out = format!("Repository: {}\n", self.repository);

        out.push_str("\nDefault Reviewers:\n");
        match &self.default_reviewers {
            Ok(reviewers) => {
                for reviewer in reviewers {
                    out.push_str(&format!("- Name: {}\n", reviewer.name));
                    out.push_str(&format!("  Email: {}\n", reviewer.email));
                }
            }
            Err(e) => out.push_str(&format!("Failed to fetch default reviewers: {}\n", e)),
        }

        out.push_str("\nMerge Checks:\n");
        match &self.merge_checks {
            Ok(checks) => {
                for (label, value) in checks.entries() {
                    out.push_str(&format!("- {}: {}\n", label, value));
                }
            }
            Err(e) => out.push_str(&format!("Failed to fetch repository settings: {}\n", e)),
        }

        out.push_str("\nBranch Restrictions:\n");
        match &self.branch_restrictions {
            Ok(restrictions) => match serde_yaml::to_string(restrictions) {
                Ok(yaml) => out.push_str(&yaml),
                Err(e) => out.push_str(&format!("Failed to render branch restrictions: {}\n", e)),
            },
            Err(e) => out.push_str(&format!("Failed to fetch branch restrictions: {}\n", e)),
        }

        out
    }
}

/// Reads repository settings from a Bitbucket Server instance.
pub struct RepositoryInspector<'a> {
    client: &'a BitbucketClient,
    project: String,
    repository: String,
}

impl<'a> RepositoryInspector<'a> {
    pub fn new(
        client: &'a BitbucketClient,
        project: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            client,
            project: project.into(),
            repository: repository.into(),
        }
    }

    fn repo_path(&self) -> String {
        format!(
            "projects/{}/repos/{}",
            segment(&self.project),
            segment(&self.repository)
        )
    }

    /// Default reviewers across every default-reviewer condition, in condition order.
    pub fn default_reviewers(&self) -> Result<Vec<Reviewer>> {
        let endpoint = format!(
            "/rest/default-reviewers/1.0/{}/conditions",
            self.repo_path()
        );
        let conditions = self
            .client
            .collect_as::<ApiCondition>(&endpoint, Pagination::Flat)?;

        Ok(conditions
            .into_iter()
            .flat_map(|c| c.reviewers)
            .map(|r| Reviewer {
                name: r.display_name,
                email: r.email_address,
            })
            .collect())
    }

    /// The pull-request merge checks.
    pub fn merge_checks(&self) -> Result<MergeChecks> {
        let endpoint = format!(
            "/rest/api/1.0/{}/settings/pull-requests",
            self.repo_path()
        );
        let value = self.client.get(&endpoint, &[])?;
        serde_json::from_value(value).map_err(|e| BitbucketError::UnexpectedResponse {
            endpoint,
            message: format!("Failed to parse pull-request settings: {}", e),
        })
    }

    /// Branch restrictions grouped by branch matcher.
    pub fn branch_restrictions(&self) -> Result<BranchRestrictions> {
        let endpoint = format!(
            "/rest/branch-permissions/2.0/{}/restrictions",
            self.repo_path()
        );
        let restrictions = self
            .client
            .collect_as::<ApiRestriction>(&endpoint, Pagination::PageStart)?;
        Ok(reduce_restrictions(restrictions))
    }

    /// Run all three reads. A failed read is recorded in place; the others still run.
    pub fn inspect(&self) -> Inspection {
        let default_reviewers = self.default_reviewers();
        if let Err(e) = &default_reviewers {
            tracing::warn!(error = %e, "failed to fetch default reviewers");
        }
        let merge_checks = self.merge_checks();
        if let Err(e) = &merge_checks {
            tracing::warn!(error = %e, "failed to fetch pull-request settings");
        }
        let branch_restrictions = self.branch_restrictions();
        if let Err(e) = &branch_restrictions {
            tracing::warn!(error = %e, "failed to fetch branch restrictions");
        }

        Inspection {
            project: self.project.clone(),
            repository: self.repository.clone(),
            default_reviewers,
            merge_checks,
            branch_restrictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn restriction(branch: &str, kind: &str) -> ApiRestriction {
        serde_json::from_value(json!({
            "id": 1,
            "type": kind,
            "matcher": {"id": branch, "displayId": branch}
        }))
        .unwrap()
    }

    #[test]
    fn test_reduce_restrictions_collapses_duplicates() {
        let map = reduce_restrictions(vec![
            restriction("refs/heads/master", "read-only"),
            restriction("refs/heads/master", "no-deletes"),
            restriction("refs/heads/master", "read-only"),
            restriction("refs/heads/develop", "fast-forward-only"),
        ]);

        assert_eq!(map.len(), 2);
        assert_eq!(
            map["refs/heads/master"],
            vec!["read-only".to_string(), "no-deletes".to_string()]
        );
        assert_eq!(map["refs/heads/develop"], vec!["fast-forward-only".to_string()]);
    }

    #[test]
    fn test_merge_checks_parse_with_defaults() {
        let checks: MergeChecks = serde_json::from_value(json!({
            "needsWork": true,
            "requiredApprovers": 2,
            "mergeConfig": {"defaultStrategy": {"id": "no-ff"}}
        }))
        .unwrap();

        assert!(checks.needs_work);
        assert!(!checks.required_all_approvers);
        assert_eq!(checks.required_approvers, 2);
        assert_eq!(checks.required_successful_builds, 0);
    }

    #[test]
    fn test_merge_check_labels() {
        let labels: Vec<&str> = MergeChecks::default()
            .entries()
            .into_iter()
            .map(|(label, _)| label)
            .collect();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[0], "No \"needs work\" status");
        assert_eq!(labels[4], "Minimum successful builds");
    }

    #[test]
    fn test_render_reports_each_section_independently() {
        let mut restrictions = BranchRestrictions::new();
        restrictions.insert("refs/heads/main".into(), vec!["read-only".into()]);

        let inspection = Inspection {
            project: "INF".into(),
            repository: "network".into(),
            default_reviewers: Ok(vec![Reviewer {
                name: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
            }]),
            merge_checks: Err(BitbucketError::Api {
                status: 403,
                body: "forbidden".into(),
            }),
            branch_restrictions: Ok(restrictions),
        };

        let text = inspection.render();
        assert!(text.starts_with("Repository: network\n"));
        assert!(text.contains("- Name: Ada Lovelace\n  Email: ada@example.com"));
        assert!(text.contains("Failed to fetch repository settings"));
        assert!(text.contains("refs/heads/main:\n- read-only"));
        assert!(!inspection.is_complete());
    }
}
