//! Project provisioning: a project with a generated key plus its two standard groups.
//!
//! Provisioning moves through [`ProvisionState`]: the deterministic key is proposed, checked,
//! replaced on collision, the project is created, then the `Development` (`write`) and
//! `AppSupport` (`admin`) groups are created and granted their permission. Nothing is rolled
//! back; a failed group step leaves the earlier steps in place and is reported.

mod key;

pub use key::{
    KEY_PART_LEN, MAX_KEY_SUFFIX, generate_project_key, generate_unique_project_key,
    is_valid_project_key, permuted_project_key,
};

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;

use crate::bitbucket::ProjectOps;
use crate::error::Result;

/// Random permutations tried before falling back to numeric suffixes.
pub const DEFAULT_MAX_KEY_ATTEMPTS: usize = 25;

/// Groups created for every project: name suffix and project permission.
pub const STANDARD_GROUPS: [(&str, &str); 2] = [("Development", "write"), ("AppSupport", "admin")];

/// Provisioning progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionState {
    KeyProposed(String),
    KeyCollision(String),
    KeyAccepted(String),
    ProjectCreated(String),
    GroupsProvisioned,
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionState::KeyProposed(key) => write!(f, "key {key} proposed"),
            ProvisionState::KeyCollision(key) => write!(f, "key {key} already exists"),
            ProvisionState::KeyAccepted(key) => write!(f, "key {key} accepted"),
            ProvisionState::ProjectCreated(key) => write!(f, "project {key} created"),
            ProvisionState::GroupsProvisioned => write!(f, "groups provisioned"),
        }
    }
}

/// Result of creating one group and granting it a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub name: String,
    pub permission: String,
    /// Set once the group exists.
    pub slug: Option<String>,
    pub permission_granted: bool,
    pub error: Option<String>,
}

impl GroupOutcome {
    pub fn is_success(&self) -> bool {
        self.slug.is_some() && self.permission_granted
    }
}

/// Everything a provisioning run did.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub project_name: String,
    pub project_key: String,
    pub history: Vec<ProvisionState>,
    pub groups: Vec<GroupOutcome>,
}

impl ProvisionReport {
    pub fn state(&self) -> Option<&ProvisionState> {
        self.history.last()
    }

    /// True if the project and every group were provisioned.
    pub fn is_complete(&self) -> bool {
        self.state() == Some(&ProvisionState::GroupsProvisioned)
    }
}

/// Provisions projects in one workspace.
pub struct Provisioner<'a, P: ProjectOps + ?Sized> {
    ops: &'a P,
    workspace: String,
    max_key_attempts: usize,
    rng: StdRng,
}

impl<'a, P: ProjectOps + ?Sized> Provisioner<'a, P> {
    pub fn new(ops: &'a P, workspace: impl Into<String>) -> Self {
        Self {
            ops,
            workspace: workspace.into(),
            max_key_attempts: DEFAULT_MAX_KEY_ATTEMPTS,
            rng: StdRng::from_entropy(),
        }
    }

    /// Cap the number of random key permutations tried on collision.
    pub fn max_key_attempts(mut self, attempts: usize) -> Self {
        self.max_key_attempts = attempts;
        self
    }

    /// Seed the key permutation generator, for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Provision `{business_area}-{project_name}` and its groups.
    ///
    /// Key generation and project creation failures abort the run; group failures are
    /// recorded in the report.
    pub fn run(&mut self, project_name: &str, business_area: &str) -> Result<ProvisionReport> {
        let project_name = project_name.trim();
        let business_area = business_area.trim();
        let full_name = format!("{}-{}", business_area, project_name);
        let mut history = Vec::new();

        let proposed = generate_project_key(project_name, business_area)?;
        transition(&mut history, ProvisionState::KeyProposed(proposed.clone()));

        let ops = self.ops;
        let workspace = self.workspace.as_str();
        let key = generate_unique_project_key(
            project_name,
            business_area,
            &mut self.rng,
            self.max_key_attempts,
            |candidate| {
                let exists = ops.project_exists(workspace, candidate)?;
                if exists {
                    tracing::info!(key = candidate, "project key collision");
                }
                Ok(exists)
            },
        )?;
        if key != proposed {
            transition(&mut history, ProvisionState::KeyCollision(proposed));
        }
        transition(&mut history, ProvisionState::KeyAccepted(key.clone()));

        let created = self.ops.create_project(workspace, &full_name, &key)?;
        let key = if created.key.is_empty() { key } else { created.key };
        transition(&mut history, ProvisionState::ProjectCreated(key.clone()));

        let groups: Vec<GroupOutcome> = STANDARD_GROUPS
            .iter()
            .map(|(suffix, permission)| {
                let name = format!("{}-{}", full_name, suffix);
                self.provision_group(&key, &name, permission)
            })
            .collect();

        if groups.iter().all(GroupOutcome::is_success) {
            transition(&mut history, ProvisionState::GroupsProvisioned);
        }

        Ok(ProvisionReport {
            project_name: full_name,
            project_key: key,
            history,
            groups,
        })
    }

    fn provision_group(&self, project_key: &str, name: &str, permission: &str) -> GroupOutcome {
        let mut outcome = GroupOutcome {
            name: name.to_string(),
            permission: permission.to_string(),
            slug: None,
            permission_granted: false,
            error: None,
        };

        let group = match self.ops.create_group(&self.workspace, name) {
            Ok(group) => group,
            Err(e) => {
                tracing::warn!(group = name, error = %e, "failed to create group");
                outcome.error = Some(format!("Error creating group: {}", e));
                return outcome;
            }
        };
        outcome.slug = Some(group.slug.clone());

        match self
            .ops
            .set_project_group_permission(&self.workspace, project_key, &group.slug, permission)
        {
            Ok(()) => outcome.permission_granted = true,
            Err(e) => {
                tracing::warn!(group = name, error = %e, "failed to set group permission");
                outcome.error = Some(format!("Error setting permission: {}", e));
            }
        }

        outcome
    }
}

fn transition(history: &mut Vec<ProvisionState>, state: ProvisionState) {
    tracing::info!(state = %state, "provisioning");
    history.push(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitbucket::{CreatedGroup, CreatedProject};
    use crate::error::BitbucketError;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// In-memory stand-in for the Bitbucket project endpoints.
    #[derive(Default)]
    struct FakeWorkspace {
        existing: HashSet<String>,
        fail_group: Option<String>,
        fail_permission: Option<String>,
        calls: RefCell<Vec<String>>,
    }

    impl ProjectOps for FakeWorkspace {
        fn project_exists(&self, _workspace: &str, key: &str) -> Result<bool> {
            self.calls.borrow_mut().push(format!("exists {key}"));
            Ok(self.existing.contains(key))
        }

        fn create_project(&self, _workspace: &str, name: &str, key: &str) -> Result<CreatedProject> {
            self.calls.borrow_mut().push(format!("create project {name} {key}"));
            Ok(CreatedProject {
                key: key.to_string(),
                name: name.to_string(),
            })
        }

        fn create_group(&self, _workspace: &str, name: &str) -> Result<CreatedGroup> {
            self.calls.borrow_mut().push(format!("create group {name}"));
            if self.fail_group.as_deref() == Some(name) {
                return Err(BitbucketError::Api {
                    status: 400,
                    body: "group exists".into(),
                });
            }
            Ok(CreatedGroup {
                slug: name.to_lowercase(),
                name: name.to_string(),
            })
        }

        fn set_project_group_permission(
            &self,
            _workspace: &str,
            project_key: &str,
            group_slug: &str,
            permission: &str,
        ) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("grant {permission} {group_slug} on {project_key}"));
            if self.fail_permission.as_deref() == Some(group_slug) {
                return Err(BitbucketError::Api {
                    status: 403,
                    body: "forbidden".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_provision_free_key() {
        let workspace = FakeWorkspace::default();
        let report = Provisioner::new(&workspace, "acme")
            .run("Foundation", "Finance")
            .unwrap();

        assert_eq!(report.project_name, "Finance-Foundation");
        assert_eq!(report.project_key, "FIN_FOU");
        assert!(report.is_complete());
        assert_eq!(
            report.history,
            vec![
                ProvisionState::KeyProposed("FIN_FOU".into()),
                ProvisionState::KeyAccepted("FIN_FOU".into()),
                ProvisionState::ProjectCreated("FIN_FOU".into()),
                ProvisionState::GroupsProvisioned,
            ]
        );
        assert_eq!(
            *workspace.calls.borrow(),
            vec![
                "exists FIN_FOU",
                "create project Finance-Foundation FIN_FOU",
                "create group Finance-Foundation-Development",
                "grant write finance-foundation-development on FIN_FOU",
                "create group Finance-Foundation-AppSupport",
                "grant admin finance-foundation-appsupport on FIN_FOU",
            ]
        );
    }

    #[test]
    fn test_provision_after_collision() {
        let workspace = FakeWorkspace {
            existing: HashSet::from(["FIN_FOU".to_string()]),
            ..Default::default()
        };
        let report = Provisioner::new(&workspace, "acme")
            .seed(11)
            .run("Foundation", "Finance")
            .unwrap();

        assert_ne!(report.project_key, "FIN_FOU");
        assert!(report.project_key.starts_with("FIN_"));
        assert_eq!(
            report.history[1],
            ProvisionState::KeyCollision("FIN_FOU".into())
        );
        assert!(report.is_complete());
    }

    #[test]
    fn test_group_failure_is_reported_without_rollback() {
        let workspace = FakeWorkspace {
            fail_group: Some("Finance-Foundation-Development".into()),
            ..Default::default()
        };
        let report = Provisioner::new(&workspace, "acme")
            .run("Foundation", "Finance")
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(
            report.state(),
            Some(&ProvisionState::ProjectCreated("FIN_FOU".into()))
        );
        assert!(!report.groups[0].is_success());
        assert!(report.groups[0].error.as_deref().unwrap().contains("Error creating group"));
        assert!(report.groups[1].is_success());
    }

    #[test]
    fn test_permission_failure_keeps_group() {
        let workspace = FakeWorkspace {
            fail_permission: Some("finance-foundation-appsupport".into()),
            ..Default::default()
        };
        let report = Provisioner::new(&workspace, "acme")
            .run("Foundation", "Finance")
            .unwrap();

        let support = &report.groups[1];
        assert_eq!(support.slug.as_deref(), Some("finance-foundation-appsupport"));
        assert!(!support.permission_granted);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_invalid_input_creates_nothing() {
        let workspace = FakeWorkspace::default();
        let err = Provisioner::new(&workspace, "acme")
            .run("Fo", "Finance")
            .unwrap_err();

        assert!(matches!(err, BitbucketError::InvalidProjectKey { .. }));
        assert!(workspace.calls.borrow().is_empty());
    }
}
