//! Error types for Bitbucket operations.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Bitbucket operations.
#[derive(Error, Debug)]
pub enum BitbucketError {
    #[error("Bitbucket API request failed ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Authentication failed: {body}")]
    AuthenticationFailed { body: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] globset::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unexpected response from {endpoint}: {message}")]
    UnexpectedResponse { endpoint: String, message: String },

    #[error("Pagination of {endpoint} exceeded {limit} pages")]
    PageLimitExceeded { endpoint: String, limit: usize },

    #[error("Invalid project key input: {message}")]
    InvalidProjectKey { message: String },

    #[error("No free project key found for prefix {prefix} after {attempts} attempts")]
    KeyGenerationExhausted { prefix: String, attempts: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Git authentication failed: {message}")]
    GitAuth { message: String },

    #[error("Branch operation failed: {message}")]
    BranchError { message: String },

    #[error("Push failed: {message}")]
    PushError { message: String },

    #[error("Clone failed for {repo}: {message}")]
    CloneError { repo: String, message: String },

    #[error("Working directory already exists: {0}")]
    WorkDirExists(PathBuf),
}

impl BitbucketError {
    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BitbucketError::Api { status, .. } => Some(*status),
            BitbucketError::AuthenticationFailed { .. } => Some(401),
            _ => None,
        }
    }

    /// Returns true if this error means the credentials were rejected.
    ///
    /// Batch drivers stop on these instead of repeating the failure for every unit of work.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            BitbucketError::AuthenticationFailed { .. } | BitbucketError::GitAuth { .. }
        )
    }
}

/// A specialized Result type for Bitbucket operations.
pub type Result<T> = std::result::Result<T, BitbucketError>;
