//! Git authentication configuration.

use git2::{Cred, CredentialType, RemoteCallbacks};
use std::path::PathBuf;

use crate::credentials::Credentials;

/// Authentication method for git remote operations.
#[derive(Debug, Clone, Default)]
pub enum GitAuth {
    /// SSH key authentication.
    SshKey {
        private_key_path: PathBuf,
        passphrase: Option<String>,
    },
    /// Username and app password, for HTTPS remotes.
    Basic(Credentials),
    /// Keys loaded in the running SSH agent.
    #[default]
    Agent,
}

impl GitAuth {
    /// SSH key auth from `~/.ssh/id_ed25519` or `~/.ssh/id_rsa`, falling back to the agent
    /// when neither exists.
    pub fn ssh_default() -> Self {
        let Some(home) = dirs::home_dir() else {
            return Self::Agent;
        };

        ["id_ed25519", "id_rsa"]
            .iter()
            .map(|name| home.join(".ssh").join(name))
            .find(|path| path.exists())
            .map(Self::ssh_key)
            .unwrap_or(Self::Agent)
    }

    /// SSH key auth with a specific key path.
    pub fn ssh_key(path: impl Into<PathBuf>) -> Self {
        Self::SshKey {
            private_key_path: path.into(),
            passphrase: None,
        }
    }

    /// Set passphrase for SSH key auth.
    pub fn with_passphrase(self, passphrase: impl Into<String>) -> Self {
        match self {
            Self::SshKey {
                private_key_path, ..
            } => Self::SshKey {
                private_key_path,
                passphrase: Some(passphrase.into()),
            },
            other => other,
        }
    }

    /// Build remote callbacks answering credential requests with this method.
    pub(crate) fn callbacks<'a>(&self) -> RemoteCallbacks<'a> {
        let auth = self.clone();
        let mut callbacks = RemoteCallbacks::new();

        callbacks.credentials(move |_url, username_from_url, allowed_types| {
            let username = username_from_url.unwrap_or("git");
            match &auth {
                GitAuth::SshKey {
                    private_key_path,
                    passphrase,
                } if allowed_types.contains(CredentialType::SSH_KEY) => {
                    Cred::ssh_key(username, None, private_key_path, passphrase.as_deref())
                }
                GitAuth::Basic(credentials)
                    if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) =>
                {
                    Cred::userpass_plaintext(credentials.username(), credentials.secret())
                }
                _ if allowed_types.contains(CredentialType::SSH_KEY) => {
                    Cred::ssh_key_from_agent(username)
                }
                _ => Cred::default(),
            }
        });

        callbacks
    }
}
