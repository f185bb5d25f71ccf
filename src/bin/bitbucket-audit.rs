//! Audit a Bitbucket Cloud workspace into a YAML report.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bitbucket_ops::audit::{AuditReport, Auditor, FailurePolicy};
use bitbucket_ops::bitbucket::BitbucketClient;
use bitbucket_ops::credentials::{CLOUD_ENV, Credentials};
use bitbucket_ops::prompt;
use bitbucket_ops::settings::Settings;
use bitbucket_ops::telemetry::init_tracing;
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(name = "bitbucket-audit")]
#[command(author, version, about = "Audit groups, repositories and projects of a Bitbucket Cloud workspace", long_about = None)]
struct Cli {
    /// YAML settings file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Workspace to audit (prompted when absent from flags and settings)
    #[arg(short, long)]
    workspace: Option<String>,

    /// Bitbucket Cloud API URL
    #[arg(long)]
    bitbucket_url: Option<String>,

    /// Report destination
    #[arg(short, long, default_value = "output.yaml")]
    output: PathBuf,

    /// Record permission lookup failures instead of stopping
    #[arg(long)]
    keep_going: bool,
}

fn main() -> Result<()> {
    init_tracing(Level::WARN);
    let cli = Cli::parse();

    let settings = Settings::load_optional(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let url = settings.resolve_url(cli.bitbucket_url.as_deref());
    let workspace = match settings.resolve_workspace(cli.workspace.as_deref()) {
        Some(workspace) => workspace,
        None => prompt::required_line("Bitbucket workspace: ")?,
    };

    let credentials = Credentials::from_env_or_prompt(CLOUD_ENV, "Bitbucket cloud")?;
    let client = BitbucketClient::new(url, credentials).context("Failed to create client")?;

    let policy = if cli.keep_going {
        FailurePolicy::KeepGoing
    } else {
        FailurePolicy::Abort
    };
    let auditor = Auditor::new(&client, workspace).with_policy(policy);

    let groups = stage("Auditing groups", || auditor.groups())?;
    let repositories = stage("Auditing repositories", || auditor.repositories())?;
    let projects = stage("Auditing projects", || auditor.projects())?;

    let mut errors = repositories.failures;
    errors.extend(projects.failures);
    let report = AuditReport {
        groups,
        repositories: repositories.records,
        projects: projects.records,
        errors,
    };

    stage("Generating YAML report", || report.write_yaml(&cli.output))?;

    if !report.errors.is_empty() {
        println!(
            "{} permission lookups failed; see the errors section of {}",
            report.errors.len(),
            cli.output.display()
        );
    }

    Ok(())
}

/// Run one step, printing `label: Successful` or `label: Failed`.
fn stage<T>(
    label: &str,
    step: impl FnOnce() -> bitbucket_ops::error::Result<T>,
) -> Result<T> {
    print!("{label}: ");
    std::io::stdout().flush().ok();

    match step() {
        Ok(value) => {
            println!("Successful");
            Ok(value)
        }
        Err(e) => {
            println!("Failed");
            Err(e).context(label.to_string())
        }
    }
}
