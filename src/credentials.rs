//! Basic-auth credentials for the Bitbucket API.

use crate::error::Result;
use crate::prompt;
use std::fmt;

/// Environment variables holding Bitbucket Cloud credentials.
pub const CLOUD_ENV: (&str, &str) = ("BITBUCKET_CLOUD_USERNAME", "BITBUCKET_CLOUD_PASSWORD");

/// Environment variables holding Bitbucket Server credentials.
pub const SERVER_ENV: (&str, &str) = ("BITBUCKET_SERVER_USERNAME", "BITBUCKET_SERVER_PASSWORD");

/// Username and secret (password or app password) used for basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl Credentials {
    /// Create credentials from a username and secret.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Read credentials from the given environment variables, prompting for anything unset.
    ///
    /// `label` names the platform in the prompts, e.g. "Bitbucket cloud".
    /// The secret prompt does not echo.
    pub fn from_env_or_prompt(vars: (&str, &str), label: &str) -> Result<Self> {
        let (user_var, secret_var) = vars;

        let username = match non_empty_env(user_var) {
            Some(username) => username,
            None => prompt::line(&format!("{label} username: "))?,
        };
        let secret = match non_empty_env(secret_var) {
            Some(secret) => secret,
            None => prompt::secret(&format!("{label} password: "))?,
        };

        Ok(Self::new(username, secret))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Read an environment variable, treating an empty value as unset.
pub fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
