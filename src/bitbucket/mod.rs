//! Bitbucket REST API integration.
//!
//! This module provides a blocking client for the Bitbucket Cloud and Server APIs to:
//! - Walk paginated collections
//! - Search code across a workspace
//! - Create projects, groups and permissions
//! - Create pull requests
//!
//! # Example
//!
//! ```rust,no_run
//! use bitbucket_ops::bitbucket::{BitbucketClient, Pagination};
//! use bitbucket_ops::credentials::Credentials;
//!
//! let client = BitbucketClient::new(
//!     "https://api.bitbucket.org",
//!     Credentials::new("alice", "app-password"),
//! )?;
//!
//! let repos = client.collect("/2.0/repositories/acme?pagelen=100", Pagination::NextUrl)?;
//! for repo in repos {
//!     println!("{}", repo["slug"]);
//! }
//! # Ok::<(), bitbucket_ops::error::BitbucketError>(())
//! ```

mod client;
mod pagination;
mod pr;
mod projects;
mod search;

pub use client::{BitbucketClient, DEFAULT_TIMEOUT};
pub(crate) use client::segment;
pub use pagination::{Cursor, DEFAULT_MAX_PAGES, Page, Pagination};
pub use pr::{CreatePullRequest, PullRequest, PullRequestOps};
pub use projects::{CreatedGroup, CreatedProject, ProjectOps};
pub use search::{SearchOps, dedup_preserving_order, hit_repository, repository_from_link};
