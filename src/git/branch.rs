//! Git branch operations.

use git2::{BranchType, build::CheckoutBuilder};

use crate::error::{BitbucketError, Result};
use crate::git::GitOps;

/// Branch operations for GitOps.
pub trait BranchOps {
    /// Create a branch at HEAD.
    fn create_branch(&self, name: &str) -> Result<()>;

    /// Switch the working copy and HEAD to a local branch.
    fn checkout_branch(&self, name: &str) -> Result<()>;

    /// Switch to `name`, creating it at HEAD first when it does not exist locally.
    fn create_and_checkout(&self, name: &str) -> Result<()>;

    fn branch_exists(&self, name: &str) -> bool;
}

impl BranchOps for GitOps {
    fn create_branch(&self, name: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo
            .branch(name, &head, false)
            .map_err(|e| BitbucketError::BranchError {
                message: format!("cannot create '{}': {}", name, e.message()),
            })?;
        Ok(())
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        let branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(|_| BitbucketError::BranchError {
                message: format!("no local branch '{}'", name),
            })?;
        let refname = branch
            .get()
            .name()
            .ok_or_else(|| BitbucketError::BranchError {
                message: format!("branch '{}' has a non UTF-8 ref name", name),
            })?
            .to_string();

        let target = branch.get().peel(git2::ObjectType::Commit)?;
        self.repo
            .checkout_tree(&target, Some(CheckoutBuilder::new().safe()))?;
        self.repo.set_head(&refname)?;
        Ok(())
    }

    fn create_and_checkout(&self, name: &str) -> Result<()> {
        if !self.branch_exists(name) {
            self.create_branch(name)?;
        }
        self.checkout_branch(name)
    }

    fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }
}
