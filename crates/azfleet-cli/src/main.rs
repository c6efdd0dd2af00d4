//! azfleet - maintenance tools for an Azure worker fleet.
//!
//! This is the entry point for the `azfleet` binary.

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use azfleet_az::{AzCli, Credentials};
use clap::{Parser, Subcommand};

use azfleet_rbac::EXAMPLE_REPORT;

/// azfleet - maintenance tools for an Azure worker fleet.
#[derive(Parser, Debug)]
#[command(name = "azfleet")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log filter, e.g. `debug` or `azfleet_rbac=trace,info`. Overrides RUST_LOG.
    #[arg(long, global = true, env = "AZFLEET_LOG_LEVEL")]
    log_level: Option<String>,

    /// Also write logs to this file.
    #[arg(long, global = true, env = "AZFLEET_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Client id of a managed identity to sign in with. Uses the current
    /// `az login` account when omitted.
    #[arg(long, global = true, env = "AZFLEET_MANAGED_IDENTITY")]
    managed_identity: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Make sure the required platform extensions are installed on VMs.
    InstallExtensions(InstallExtensionsArgs),
    /// Remove role assignments that belong to deleted directory users.
    #[command(after_help = format!("The stale-identity report has this format:\n{EXAMPLE_REPORT}"))]
    RemoveOrphans(RemoveOrphansArgs),
}

#[derive(clap::Args, Debug)]
struct InstallExtensionsArgs {
    /// Names of the VMs to check (default all VMs in the resource group).
    vms: Vec<String>,

    /// Resource group containing the VMs.
    #[arg(short = 'g', long, alias = "resource_group")]
    resource_group: String,

    /// Subscription containing the resource group.
    #[arg(short = 's', long)]
    subscription: String,

    /// Name of the user-assigned managed identity the Windows monitor agent
    /// authenticates with.
    #[arg(long)]
    uami: Option<String>,
}

#[derive(clap::Args, Debug)]
struct RemoveOrphansArgs {
    /// Stale-identity report exported from the security portal. Without one,
    /// every role assignment in the subscription is scanned.
    #[arg(short = 'j', long, alias = "json_file")]
    json_file: Option<PathBuf>,

    /// Subscription to switch the az account to first.
    #[arg(short = 's', long)]
    subscription: Option<String>,

    /// Verify the orphaned accounts and list the role assignments that would
    /// be removed, without removing anything.
    #[arg(short = 'd', long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    logging::init_logging(args.log_level.as_deref(), args.log_file.as_deref())?;

    let az = Arc::new(AzCli::locate()?);
    Credentials::from_client_id(args.managed_identity)
        .establish(az.as_ref())
        .await?;

    let clean = match args.command {
        Command::InstallExtensions(cmd) => commands::install_extensions(az, cmd).await?,
        Command::RemoveOrphans(cmd) => commands::remove_orphans(az, cmd).await?,
    };

    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
