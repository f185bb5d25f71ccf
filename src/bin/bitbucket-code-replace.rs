//! Replace a string across every repository a Bitbucket code search returns, one pull
//! request per repository.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bitbucket_ops::bitbucket::BitbucketClient;
use bitbucket_ops::codemod::{
    CodeReplace, DEFAULT_BRANCH, DEFAULT_CLONE_URL, DEFAULT_COMMIT_MESSAGE, DEFAULT_PR_TITLE,
    RepoResult, RepoStatus,
};
use bitbucket_ops::credentials::{CLOUD_ENV, Credentials};
use bitbucket_ops::git::GitAuth;
use bitbucket_ops::prompt;
use bitbucket_ops::settings::DEFAULT_CLOUD_URL;
use bitbucket_ops::telemetry::init_tracing;
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(name = "bitbucket-code-replace")]
#[command(author, version, about = "Find and replace a string across Bitbucket Cloud repositories via pull requests", long_about = None)]
struct Cli {
    /// Workspace to search (prompted when absent)
    #[arg(short, long, env = "BITBUCKET_CLOUD_WORKSPACE")]
    workspace: Option<String>,

    /// Code search query selecting the repositories (prompted when absent)
    #[arg(short, long)]
    query: Option<String>,

    /// Exact text to replace (prompted when absent)
    #[arg(short, long)]
    search: Option<String>,

    /// Replacement text (prompted when absent)
    #[arg(short, long)]
    replace: Option<String>,

    /// Feature branch carrying the change
    #[arg(short, long, default_value = DEFAULT_BRANCH)]
    branch: String,

    #[arg(long, default_value = DEFAULT_COMMIT_MESSAGE)]
    commit_message: String,

    #[arg(long, default_value = DEFAULT_PR_TITLE)]
    pr_title: String,

    #[arg(long, default_value = "")]
    pr_description: String,

    /// Clone URL template; {workspace} and {repository} are substituted
    #[arg(long, default_value = DEFAULT_CLONE_URL)]
    clone_url: String,

    /// Directory for the temporary working copies
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// SSH private key for clone and push (default: ~/.ssh/id_ed25519, ~/.ssh/id_rsa, then the agent)
    #[arg(long)]
    ssh_key: Option<PathBuf>,

    /// Pause after each repository
    #[arg(short, long)]
    interactive: bool,

    /// Leave working copies on disk
    #[arg(long)]
    keep_worktrees: bool,

    /// Write a YAML report of every repository's outcome
    #[arg(long)]
    report: Option<PathBuf>,

    /// Bitbucket Cloud API URL
    #[arg(long, default_value = DEFAULT_CLOUD_URL)]
    bitbucket_url: String,
}

fn main() -> Result<()> {
    init_tracing(Level::WARN);
    let cli = Cli::parse();

    let credentials = Credentials::from_env_or_prompt(CLOUD_ENV, "Bitbucket cloud")?;
    let workspace = or_prompt(cli.workspace, "Bitbucket workspace: ")?;
    let query = or_prompt(cli.query, "Code search query: ")?;
    let search = or_prompt(cli.search, "Search string: ")?;
    let replace = match cli.replace {
        Some(replace) => replace,
        None => prompt::line("Replace string: ")?,
    };

    let git_auth = match cli.ssh_key {
        Some(path) => GitAuth::ssh_key(path),
        None => GitAuth::ssh_default(),
    };

    let client =
        BitbucketClient::new(&cli.bitbucket_url, credentials).context("Failed to create client")?;

    let result = CodeReplace::new(workspace, query, search, replace)?
        .on_branch(cli.branch)
        .commit_message(cli.commit_message)
        .create_pr(cli.pr_title, cli.pr_description)
        .clone_url(cli.clone_url)
        .work_dir(cli.work_dir)
        .git_auth(git_auth)
        .interactive(cli.interactive)
        .keep_worktrees(cli.keep_worktrees)
        .execute_with(&client, print_result)
        .context("Bulk replace failed")?;

    let summary = &result.summary;
    println!(
        "\n{} repositories: {} changed, {} unchanged, {} failed, {} pull requests opened",
        summary.total_repos,
        summary.changed_repos,
        summary.unchanged_repos,
        summary.failed_repos,
        summary.prs_created
    );

    if let Some(path) = &cli.report {
        result
            .write_report(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    if let Some(reason) = &result.aborted {
        anyhow::bail!("Bulk replace aborted: {reason}");
    }
    if result.has_failures() {
        anyhow::bail!("{} repositories failed", summary.failed_repos);
    }
    Ok(())
}

fn or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value.filter(|v| !v.is_empty()) {
        Some(value) => Ok(value),
        None => Ok(prompt::required_line(label)?),
    }
}

fn print_result(result: &RepoResult) {
    println!("{}", result.repository);
    match &result.status {
        RepoStatus::Failed { .. } => println!(" - Status: {}", result.status),
        status => println!(
            " - Status: {status} ({} occurrences in {} files)",
            result.occurrences, result.files_changed
        ),
    }
    if let Some(url) = &result.pr_url {
        println!(" - PR URL: {url}");
    }
    if let Some(error) = &result.pr_error {
        println!(" - Creating PR: Failed: {error}");
    }
    println!(" - Cleaning up repository: {}", result.cleanup);
}
