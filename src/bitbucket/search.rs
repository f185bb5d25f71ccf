//! Workspace code search.

use serde_json::Value;
use std::collections::HashSet;
use url::Url;

use crate::bitbucket::client::segment;
use crate::bitbucket::{BitbucketClient, Pagination};
use crate::error::Result;

/// Code search operations.
pub trait SearchOps {
    /// Search code in a workspace and return the slugs of the repositories with hits.
    ///
    /// Slugs are unique and ordered by their first hit.
    fn search_code_repositories(&self, workspace: &str, query: &str) -> Result<Vec<String>>;
}

impl SearchOps for BitbucketClient {
    fn search_code_repositories(&self, workspace: &str, query: &str) -> Result<Vec<String>> {
        let endpoint = format!("/2.0/workspaces/{}/search/code", segment(workspace));
        let hits = self.collect_with_query(
            &endpoint,
            &[("search_query", query)],
            Pagination::NextUrl,
        )?;

        let slugs = hits.iter().filter_map(|hit| {
            let slug = hit_repository(hit);
            if slug.is_none() {
                tracing::warn!(workspace, "search hit without a repository link, skipping");
            }
            slug
        });

        Ok(dedup_preserving_order(slugs))
    }
}

/// Extract the repository slug of a code-search hit from `file.links.self.href`.
pub fn hit_repository(hit: &Value) -> Option<String> {
    let href = hit
        .pointer("/file/links/self/href")
        .and_then(Value::as_str)?;
    repository_from_link(href)
}

/// Extract the repository slug from an API link such as
/// `https://api.bitbucket.org/2.0/repositories/{workspace}/{slug}/src/{commit}/{path}`.
pub fn repository_from_link(href: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    let segments: Vec<&str> = url.path_segments()?.collect();
    let at = segments.iter().position(|s| *s == "repositories")?;
    segments
        .get(at + 2)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Remove duplicates, keeping the first occurrence of each item in its original position.
pub fn dedup_preserving_order<I, T>(items: I) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    T: Eq + std::hash::Hash + Clone,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
