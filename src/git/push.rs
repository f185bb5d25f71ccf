//! Git push operations with authentication.

use git2::PushOptions;
use std::cell::RefCell;

use crate::error::{BitbucketError, Result};
use crate::git::{GitOps, remote_error};

/// Push operations for GitOps.
pub trait PushOps {
    /// Push a local branch to the same name on a remote.
    ///
    /// Fails if the remote refuses the ref update, e.g. through a hook or a branch
    /// restriction, even though the transfer itself completed.
    fn push(&self, remote_name: &str, branch: &str) -> Result<()>;

    /// Push a branch and record the remote branch as its upstream.
    fn push_with_upstream(&self, remote_name: &str, branch: &str) -> Result<()>;
}

impl PushOps for GitOps {
    fn push(&self, remote_name: &str, branch: &str) -> Result<()> {
        let mut remote =
            self.repo
                .find_remote(remote_name)
                .map_err(|_| BitbucketError::PushError {
                    message: format!("Remote '{}' not found", remote_name),
                })?;

        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);

        // libgit2 reports per-ref rejections here, not through the return value of push.
        let rejected = RefCell::new(Vec::new());
        let mut callbacks = self.auth.callbacks();
        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                rejected.borrow_mut().push(format!("{refname}: {message}"));
            }
            Ok(())
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        remote
            .push(&[&refspec], Some(&mut push_options))
            .map_err(|e| remote_error(e, |message| BitbucketError::PushError { message }))?;

        let rejected = rejected.borrow();
        if !rejected.is_empty() {
            return Err(BitbucketError::PushError {
                message: format!("remote rejected {}", rejected.join(", ")),
            });
        }

        Ok(())
    }

    fn push_with_upstream(&self, remote_name: &str, branch: &str) -> Result<()> {
        self.push(remote_name, branch)?;

        // Equivalent of `git push --set-upstream`: written straight to config so it does not
        // depend on a remote-tracking ref having been created.
        let mut config = self.repo.config()?;
        config.set_str(&format!("branch.{}.remote", branch), remote_name)?;
        config.set_str(
            &format!("branch.{}.merge", branch),
            &format!("refs/heads/{}", branch),
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{BranchOps, GitAuth};
    use git2::{BranchType, Repository, Signature};
    use std::fs;
    use std::path::Path;

    const BRANCH: &str = "feature/update-module-reference";

    /// A bare remote with one commit, cloned into `work`.
    fn clone_of_remote(remotes: &Path, work: &Path) -> (Repository, GitOps) {
        let remote = Repository::init_bare(remotes.join("network.git")).unwrap();
        {
            let blob = remote.blob(b"module {}").unwrap();
            let mut tree = remote.treebuilder(None).unwrap();
            tree.insert("main.tf", blob, 0o100644).unwrap();
            let tree = remote.find_tree(tree.write().unwrap()).unwrap();
            let sig = Signature::now("Test", "test@example.com").unwrap();
            remote
                .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        let url = remotes.join("network.git").display().to_string();
        let git = GitOps::clone_repository(&url, work.join("tmp_network"), GitAuth::Agent).unwrap();
        git.create_and_checkout(BRANCH).unwrap();
        (remote, git)
    }

    #[test]
    fn test_push_with_upstream() {
        let remotes = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let (remote, git) = clone_of_remote(remotes.path(), work.path());

        git.push_with_upstream("origin", BRANCH).unwrap();

        assert!(remote.find_branch(BRANCH, BranchType::Local).is_ok());
        let config = git.repo().config().unwrap();
        assert_eq!(
            config.get_string(&format!("branch.{BRANCH}.remote")).unwrap(),
            "origin"
        );
    }

    #[test]
    fn test_rejected_ref_update_fails_the_push() {
        let remotes = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let (remote, git) = clone_of_remote(remotes.path(), work.path());

        // A held lock on the remote ref makes the remote refuse the update.
        let lock = remotes
            .path()
            .join("network.git/refs/heads")
            .join(format!("{BRANCH}.lock"));
        fs::create_dir_all(lock.parent().unwrap()).unwrap();
        fs::write(&lock, "").unwrap();

        let err = git.push_with_upstream("origin", BRANCH).unwrap_err();

        match err {
            BitbucketError::PushError { message } => {
                assert!(message.contains(&format!("refs/heads/{BRANCH}")))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(remote.find_branch(BRANCH, BranchType::Local).is_err());
        assert!(
            git.repo()
                .config()
                .unwrap()
                .get_string(&format!("branch.{BRANCH}.remote"))
                .is_err()
        );
    }

    #[test]
    fn test_missing_remote() {
        let remotes = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let (_remote, git) = clone_of_remote(remotes.path(), work.path());

        let err = git.push("upstream", BRANCH).unwrap_err();
        assert!(matches!(err, BitbucketError::PushError { .. }));
    }
}
