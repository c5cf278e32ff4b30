use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nodeploy_lib::LinkCreationMode;
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use output::OutputFormat;

/// nodeploy - copy a Node.js project and its dependency closure into a deployable folder
#[derive(Parser)]
#[command(name = "nodeploy")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Deploy a project and everything it depends on
  Deploy {
    /// Path to the scenario file
    #[arg(long)]
    scenario: PathBuf,

    /// Project to deploy (defaults to the scenario's only deployment project)
    #[arg(short, long)]
    project: Option<String>,

    /// Folder the scenario's project folders are relative to
    #[arg(long, default_value = ".")]
    source: PathBuf,

    /// Folder to deploy into
    #[arg(long)]
    target: PathBuf,

    /// Delete the target folder's contents first
    #[arg(long)]
    overwrite: bool,

    /// Also write the deployment to this .zip file
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Override the scenario's link creation mode (default, script or none)
    #[arg(long)]
    link_creation: Option<LinkCreationMode>,

    /// pnpm install folder whose workaround links should be deployed
    #[arg(long)]
    pnpm_install_folder: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Create or remove the links recorded in a deployment
  Links {
    #[command(subcommand)]
    action: LinksAction,
  },
}

#[derive(Subcommand)]
enum LinksAction {
  /// Create the links listed in deploy-metadata.json
  Create {
    /// Deployment folder containing deploy-metadata.json
    target: PathBuf,
  },

  /// Remove the links listed in deploy-metadata.json
  Remove {
    /// Deployment folder containing deploy-metadata.json
    target: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Deploy {
      scenario,
      project,
      source,
      target,
      overwrite,
      archive,
      link_creation,
      pnpm_install_folder,
      output,
    } => cmd::cmd_deploy(cmd::DeployArgs {
      scenario,
      project,
      source,
      target,
      overwrite,
      archive,
      link_creation,
      pnpm_install_folder,
      output,
    }),
    Commands::Links { action } => match action {
      LinksAction::Create { target } => cmd::cmd_links_create(&target),
      LinksAction::Remove { target } => cmd::cmd_links_remove(&target),
    },
  }
}
