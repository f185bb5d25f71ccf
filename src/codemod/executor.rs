//! Per-repository pipeline for bulk replace runs.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::bitbucket::{CreatePullRequest, PullRequestOps, SearchOps};
use crate::codemod::{CleanupOutcome, CodeReplace, WorkingCopy, replace_in_tree};
use crate::error::{BitbucketError, Result};
use crate::git::{BranchOps, CommitOps, GitOps, PushOps};
use crate::prompt;

/// A stage of the per-repository pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStep {
    Clone,
    Branch,
    Edit,
    Commit,
    Push,
    PullRequest,
}

impl fmt::Display for MutationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationStep::Clone => "clone",
            MutationStep::Branch => "branch",
            MutationStep::Edit => "edit",
            MutationStep::Commit => "commit",
            MutationStep::Push => "push",
            MutationStep::PullRequest => "pull request",
        };
        f.write_str(name)
    }
}

/// Status of a repository after the pipeline ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoStatus {
    /// Changed, committed and pushed.
    Success,
    /// The search string did not occur in the working copy.
    NoChanges,
    Failed { step: MutationStep, reason: String },
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoStatus::Success => write!(f, "Successful"),
            RepoStatus::NoChanges => write!(f, "No changes"),
            RepoStatus::Failed { step, reason } => write!(f, "Failed at {step}: {reason}"),
        }
    }
}

/// Result for a single repository.
#[derive(Debug, Clone)]
pub struct RepoResult {
    pub repository: String,
    pub path: PathBuf,
    pub status: RepoStatus,
    pub files_changed: usize,
    pub occurrences: usize,
    pub pr_url: Option<String>,
    /// Set when the pull request could not be opened; the push still counts.
    pub pr_error: Option<String>,
    pub cleanup: CleanupOutcome,
}

impl RepoResult {
    fn new(repository: &str, path: PathBuf) -> Self {
        Self {
            repository: repository.to_string(),
            path,
            status: RepoStatus::NoChanges,
            files_changed: 0,
            occurrences: 0,
            pr_url: None,
            pr_error: None,
            cleanup: CleanupOutcome::NotCreated,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RepoStatus::Failed { .. })
    }
}

/// One row of the YAML run report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub repository: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<MutationStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub files_changed: usize,
    pub occurrences: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_error: Option<String>,
    pub cleanup: String,
}

impl From<&RepoResult> for ReportEntry {
    fn from(result: &RepoResult) -> Self {
        let (status, step, reason) = match &result.status {
            RepoStatus::Success => ("success", None, None),
            RepoStatus::NoChanges => ("no_changes", None, None),
            RepoStatus::Failed { step, reason } => ("failed", Some(*step), Some(reason.clone())),
        };
        Self {
            repository: result.repository.clone(),
            status,
            step,
            reason,
            files_changed: result.files_changed,
            occurrences: result.occurrences,
            pull_request_url: result.pr_url.clone(),
            pull_request_error: result.pr_error.clone(),
            cleanup: result.cleanup.to_string(),
        }
    }
}

/// Counts across a whole run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CodeReplaceSummary {
    pub total_repos: usize,
    pub changed_repos: usize,
    pub unchanged_repos: usize,
    pub failed_repos: usize,
    pub total_files_changed: usize,
    pub prs_created: usize,
}

impl CodeReplaceSummary {
    fn record(&mut self, result: &RepoResult) {
        match result.status {
            RepoStatus::Success => {
                self.changed_repos += 1;
                self.total_files_changed += result.files_changed;
                if result.pr_url.is_some() {
                    self.prs_created += 1;
                }
            }
            RepoStatus::NoChanges => self.unchanged_repos += 1,
            RepoStatus::Failed { .. } => self.failed_repos += 1,
        }
    }
}

/// Results of a bulk replace run.
#[derive(Debug, Clone)]
pub struct CodeReplaceResult {
    pub repo_results: Vec<RepoResult>,
    pub summary: CodeReplaceSummary,
    /// Why the run stopped before reaching every repository, if it did.
    pub aborted: Option<String>,
}

impl CodeReplaceResult {
    /// True if any repository failed or the run stopped early.
    pub fn has_failures(&self) -> bool {
        self.summary.failed_repos > 0 || self.aborted.is_some()
    }

    pub fn report(&self) -> Vec<ReportEntry> {
        self.repo_results.iter().map(ReportEntry::from).collect()
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.report())?)
    }

    /// Write the per-repository report as YAML.
    pub fn write_report(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

type StepResult<T> = std::result::Result<T, (MutationStep, BitbucketError)>;

trait AtStep<T> {
    fn at(self, step: MutationStep) -> StepResult<T>;
}

impl<T> AtStep<T> for Result<T> {
    fn at(self, step: MutationStep) -> StepResult<T> {
        self.map_err(|e| (step, e))
    }
}

/// Runs a [`CodeReplace`] configuration against a Bitbucket client.
pub struct CodeReplaceExecutor<'a, C: ?Sized> {
    config: CodeReplace,
    client: &'a C,
}

impl<'a, C> CodeReplaceExecutor<'a, C>
where
    C: SearchOps + PullRequestOps + ?Sized,
{
    pub fn new(config: CodeReplace, client: &'a C) -> Self {
        Self { config, client }
    }

    /// Execute the run.
    pub fn execute(self) -> Result<CodeReplaceResult> {
        self.execute_with(|_| {})
    }

    /// Execute the run, handing each repository's result to `observer` as soon as it is known.
    ///
    /// Errors only when discovery fails. Rejected credentials, or closed input in interactive
    /// mode, stop the run early: the repositories processed so far are still returned and
    /// [`CodeReplaceResult::aborted`] says why. Any other per-repository failure is recorded
    /// and the run continues.
    pub fn execute_with(self, mut observer: impl FnMut(&RepoResult)) -> Result<CodeReplaceResult> {
        fs::create_dir_all(&self.config.work_dir)?;

        let repositories = self
            .client
            .search_code_repositories(&self.config.workspace, &self.config.query)?;
        tracing::info!(count = repositories.len(), query = %self.config.query, "repositories matched");

        let mut summary = CodeReplaceSummary {
            total_repos: repositories.len(),
            ..Default::default()
        };
        let mut repo_results = Vec::with_capacity(repositories.len());
        let mut aborted = None;

        for repository in &repositories {
            let (result, fatal) = self.process_repo(repository);
            summary.record(&result);
            observer(&result);
            repo_results.push(result);

            if let Some(error) = fatal {
                tracing::warn!(repository = %repository, error = %error, "run aborted");
                aborted = Some(format!("{repository}: {error}"));
                break;
            }

            if self.config.interactive {
                match prompt::pause("Press Enter to continue...") {
                    Ok(true) => {}
                    Ok(false) => {
                        aborted = Some("input closed while waiting to continue".to_string());
                        break;
                    }
                    Err(e) => {
                        aborted = Some(e.to_string());
                        break;
                    }
                }
            }
        }

        Ok(CodeReplaceResult {
            repo_results,
            summary,
            aborted,
        })
    }

    /// Run the pipeline for one repository. The error is returned alongside the result when
    /// it must stop the whole run.
    fn process_repo(&self, repository: &str) -> (RepoResult, Option<BitbucketError>) {
        let path = self.config.work_path_for(repository);
        let mut result = RepoResult::new(repository, path.clone());

        // Never adopt (or later delete) a directory this run did not create.
        if path.exists() {
            result.status = RepoStatus::Failed {
                step: MutationStep::Clone,
                reason: BitbucketError::WorkDirExists(path).to_string(),
            };
            return (result, None);
        }

        let copy = WorkingCopy::new(path, self.config.keep_worktrees);
        let outcome = self.run_steps(repository, copy.path(), &mut result);
        result.cleanup = copy.release();

        match outcome {
            Ok(status) => {
                result.status = status;
                (result, None)
            }
            Err((step, error)) => {
                tracing::warn!(repository, %step, error = %error, "repository failed");
                result.status = RepoStatus::Failed {
                    step,
                    reason: error.to_string(),
                };
                let fatal = error.is_auth_failure().then_some(error);
                (result, fatal)
            }
        }
    }

    fn run_steps(
        &self,
        repository: &str,
        path: &Path,
        result: &mut RepoResult,
    ) -> StepResult<RepoStatus> {
        let config = &self.config;
        let url = config.clone_url_for(repository);

        tracing::info!(repository, url = %url, "cloning");
        let git = GitOps::clone_repository(&url, path, config.git_auth.clone())
            .at(MutationStep::Clone)?;

        git.create_and_checkout(&config.branch)
            .at(MutationStep::Branch)?;

        let stats = replace_in_tree(path, &config.search, &config.replace).at(MutationStep::Edit)?;
        result.files_changed = stats.files_changed;
        result.occurrences = stats.occurrences;
        if stats.occurrences == 0 {
            tracing::info!(repository, "no occurrences found");
            return Ok(RepoStatus::NoChanges);
        }

        git.stage_all().at(MutationStep::Commit)?;
        // Replacing a string with itself leaves the tree identical to HEAD.
        if !git.has_staged_changes().at(MutationStep::Commit)? {
            tracing::info!(repository, "replacement left the tree unchanged");
            return Ok(RepoStatus::NoChanges);
        }
        git.commit(&config.commit_message)
            .at(MutationStep::Commit)?;

        git.push_with_upstream("origin", &config.branch)
            .at(MutationStep::Push)?;

        let request = CreatePullRequest::new(&config.pr_title, &config.pr_description, &config.branch);
        match self
            .client
            .create_pull_request(&config.workspace, repository, &request)
        {
            Ok(pr) => result.pr_url = pr.html_url().map(String::from),
            Err(e) if e.is_auth_failure() => return Err((MutationStep::PullRequest, e)),
            Err(e) => {
                tracing::warn!(repository, error = %e, "pull request not created");
                result.pr_error = Some(e.to_string());
            }
        }

        Ok(RepoStatus::Success)
    }
}
