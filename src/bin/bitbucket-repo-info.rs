//! Print review settings and branch restrictions of one Bitbucket Server repository.

use anyhow::{Context, Result};
use bitbucket_ops::bitbucket::BitbucketClient;
use bitbucket_ops::credentials::{Credentials, SERVER_ENV};
use bitbucket_ops::inspect::RepositoryInspector;
use bitbucket_ops::telemetry::init_tracing;
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(name = "bitbucket-repo-info")]
#[command(author, version, about = "Show default reviewers, merge checks and branch restrictions of a Bitbucket Server repository", long_about = None)]
struct Cli {
    /// Bitbucket Server base URL
    #[arg(long)]
    bitbucket_url: String,

    /// Project key
    #[arg(short, long)]
    project: String,

    /// Repository slug
    #[arg(short, long)]
    repository: String,
}

fn main() -> Result<()> {
    init_tracing(Level::WARN);
    let cli = Cli::parse();

    let credentials = Credentials::from_env_or_prompt(SERVER_ENV, "Bitbucket server")?;
    let client =
        BitbucketClient::new(&cli.bitbucket_url, credentials).context("Failed to create client")?;

    let inspection = RepositoryInspector::new(&client, &cli.project, &cli.repository).inspect();
    print!("{}", inspection.render());

    for err in [
        inspection.default_reviewers.as_ref().err(),
        inspection.merge_checks.as_ref().err(),
        inspection.branch_restrictions.as_ref().err(),
    ]
    .into_iter()
    .flatten()
    {
        if err.is_auth_failure() {
            anyhow::bail!("Authentication failed for {}", client.username());
        }
    }

    Ok(())
}
