//! Create a Bitbucket Cloud project with a generated key and its standard groups.

use anyhow::{Context, Result};
use bitbucket_ops::bitbucket::BitbucketClient;
use bitbucket_ops::credentials::{CLOUD_ENV, Credentials};
use bitbucket_ops::prompt;
use bitbucket_ops::provision::{
    DEFAULT_MAX_KEY_ATTEMPTS, ProvisionReport, ProvisionState, Provisioner,
};
use bitbucket_ops::settings::DEFAULT_CLOUD_URL;
use bitbucket_ops::telemetry::init_tracing;
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(name = "bitbucket-create-project")]
#[command(author, version, about = "Create a Bitbucket Cloud project with Development and AppSupport groups", long_about = None)]
struct Cli {
    /// Project name (prompted when absent)
    #[arg(long)]
    project_name: Option<String>,

    /// Business area, used as the key prefix (prompted when absent)
    #[arg(long)]
    business_area: Option<String>,

    /// Workspace the project is created in (prompted when absent)
    #[arg(short, long, env = "BITBUCKET_CLOUD_WORKSPACE")]
    workspace: Option<String>,

    /// Bitbucket Cloud API URL
    #[arg(long, default_value = DEFAULT_CLOUD_URL)]
    bitbucket_url: String,

    /// Random key permutations tried before numeric suffixes
    #[arg(long, default_value_t = DEFAULT_MAX_KEY_ATTEMPTS)]
    max_key_attempts: usize,
}

fn main() -> Result<()> {
    init_tracing(Level::WARN);
    let cli = Cli::parse();

    let credentials = Credentials::from_env_or_prompt(CLOUD_ENV, "Bitbucket cloud")?;
    let workspace = or_prompt(cli.workspace, "Bitbucket workspace: ")?;
    let project_name = or_prompt(cli.project_name, "Project name: ")?;
    let business_area = or_prompt(cli.business_area, "Business area: ")?;

    let client =
        BitbucketClient::new(&cli.bitbucket_url, credentials).context("Failed to create client")?;

    let report = Provisioner::new(&client, &workspace)
        .max_key_attempts(cli.max_key_attempts)
        .run(&project_name, &business_area)
        .with_context(|| format!("Failed to provision project '{business_area}-{project_name}'"))?;

    print_report(&report);

    if !report.is_complete() {
        anyhow::bail!(
            "Project '{}' was created but not all groups were provisioned",
            report.project_name
        );
    }
    Ok(())
}

fn or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(value) => Ok(value),
        None => Ok(prompt::required_line(label)?),
    }
}

fn print_report(report: &ProvisionReport) {
    for state in &report.history {
        match state {
            ProvisionState::KeyCollision(key) => {
                println!("Project key '{key}' already exists. Generating a new one.")
            }
            ProvisionState::ProjectCreated(key) => {
                println!(
                    "Project '{}' created successfully with key '{key}'.",
                    report.project_name
                )
            }
            _ => {}
        }
    }

    for group in &report.groups {
        if group.slug.is_some() {
            println!("Group '{}' created successfully.", group.name);
        }
        if group.permission_granted {
            println!(
                "Permission '{}' assigned to group '{}' on project '{}'.",
                group.permission, group.name, report.project_key
            );
        }
        if let Some(error) = &group.error {
            println!("{error}");
        }
    }
}
