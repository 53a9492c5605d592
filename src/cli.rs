//! CLI parsing and command execution
//!
//! This module handles command-line argument parsing and routes commands to the appropriate handlers.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use nautobot_secrets::{
    filter_by_access_type, Config, CredentialResolver, ResolvedCredential, SecretLocator,
    ThycoticClient,
};

#[derive(Parser)]
#[command(name = "nbsecrets")]
#[command(about = "Read device credentials from Nautobot secrets-groups and Thycotic Secret Server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (defaults to environment variables)
    #[arg(short, long, env = "NBSECRETS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a sample configuration file
    Init {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "nbsecrets.toml")]
        output: PathBuf,
    },

    /// Show the credentials of a device's secrets group
    Device {
        /// Nautobot device name
        name: String,

        /// Only show credentials of this access type (e.g. GENERIC, SSH)
        #[arg(short, long)]
        access_type: Option<String>,
    },

    /// Show the credentials of a secrets group
    Group {
        /// Nautobot secrets group id
        id: String,

        /// Only show credentials of this access type (e.g. GENERIC, SSH)
        #[arg(short, long)]
        access_type: Option<String>,
    },

    /// Read a single field of a Secret Server secret
    #[command(group(ArgGroup::new("locator").required(true).args(["id", "path"])))]
    Secret {
        /// Secret Server secret id
        #[arg(long)]
        id: Option<String>,

        /// Secret Server secret path
        #[arg(long)]
        path: Option<String>,

        /// Field slug to read
        #[arg(short, long, default_value = "password")]
        field: String,
    },
}

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    // Handle init command separately as it doesn't need any connection
    if let Commands::Init { output } = &cli.command {
        Config::create_sample(output)
            .with_context(|| format!("Failed to create sample config at {:?}", output))?;
        info!("Sample configuration created at {:?}", output);
        return Ok(());
    }

    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        Config::from_env().context("Failed to load config from environment")?
    };

    match cli.command {
        Commands::Init { .. } => unreachable!(), // Handled above

        Commands::Device { name, access_type } => {
            let mut resolver = CredentialResolver::from_config(&config)?;
            let credentials = resolver
                .credentials_for_device(&name)
                .await
                .with_context(|| format!("Failed to read credentials for device {}", name))?;
            print_credentials(&credentials, access_type.as_deref())?;
        }

        Commands::Group { id, access_type } => {
            let mut resolver = CredentialResolver::from_config(&config)?;
            let credentials = resolver
                .credentials_for_group_id(&id)
                .await
                .with_context(|| format!("Failed to read credentials for secrets group {}", id))?;
            print_credentials(&credentials, access_type.as_deref())?;
        }

        Commands::Secret { id, path, field } => {
            let locator = match (id, path) {
                (Some(id), _) => SecretLocator::Id(id),
                (None, Some(path)) => SecretLocator::Path(path),
                (None, None) => anyhow::bail!("Either --id or --path is required"),
            };

            let mut client = ThycoticClient::new(config.secret_server);
            client
                .fetch(&locator)
                .await
                .with_context(|| format!("Failed to read secret ({})", locator))?;
            let value = client.field(&field)?;

            eprintln!("WARNING: Secret values will be displayed. Ensure this output is secured.");
            println!("{}", value);
        }
    }

    Ok(())
}

fn print_credentials(credentials: &[ResolvedCredential], access_type: Option<&str>) -> Result<()> {
    if credentials.is_empty() {
        eprintln!("No credentials found");
    } else {
        eprintln!("WARNING: Secret values will be displayed. Ensure this output is secured.");
    }

    let output = match access_type {
        Some(access_type) => {
            serde_json::to_string_pretty(&filter_by_access_type(credentials, access_type))
        }
        None => serde_json::to_string_pretty(credentials),
    }
    .context("Failed to serialize credentials")?;

    println!("{}", output);
    Ok(())
}
