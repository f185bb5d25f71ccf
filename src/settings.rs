//! Optional settings file supplying defaults for the command-line tools.
//!
//! ```yaml
//! bitbucket_cloud:
//!   url: https://api.bitbucket.org
//!   workspace: example-prod
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BitbucketError, Result};

/// Default Bitbucket Cloud API host.
pub const DEFAULT_CLOUD_URL: &str = "https://api.bitbucket.org";

/// Contents of a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub bitbucket_cloud: CloudSettings,
}

/// The `bitbucket_cloud` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSettings {
    pub url: Option<String>,
    pub workspace: Option<String>,
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            BitbucketError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read settings file: {}", e),
            ))
        })?;

        Self::from_yaml_str(&content)
    }

    /// Parse settings from YAML text. An empty document yields the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| {
            BitbucketError::InvalidConfig(format!("Failed to parse settings file: {}", e))
        })
    }

    /// Load settings from `path` if it exists, otherwise return the defaults.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading settings");
            Self::from_yaml(path)
        } else {
            Ok(Self::default())
        }
    }

    /// The service URL: the flag value, then the file, then the Cloud default.
    pub fn resolve_url(&self, flag: Option<&str>) -> String {
        flag.map(String::from)
            .or_else(|| self.bitbucket_cloud.url.clone())
            .unwrap_or_else(|| DEFAULT_CLOUD_URL.to_string())
    }

    /// The workspace: the flag value, then the file. `None` means the caller should prompt.
    pub fn resolve_workspace(&self, flag: Option<&str>) -> Option<String> {
        flag.map(String::from)
            .or_else(|| self.bitbucket_cloud.workspace.clone())
            .filter(|w| !w.trim().is_empty())
    }
}
