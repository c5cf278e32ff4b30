//! Implementation of the `nodeploy deploy` command.
//!
//! Loads a scenario file, turns it into deployment options for the chosen
//! project and runs the deployment.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use nodeploy_lib::scenario::load_scenario;
use nodeploy_lib::{DeployReport, LinkCreationMode, deploy};

use crate::output::{OutputFormat, format_duration, print_error, print_info, print_json, print_stat, print_success};

pub struct DeployArgs {
  pub scenario: PathBuf,
  pub project: Option<String>,
  pub source: PathBuf,
  pub target: PathBuf,
  pub overwrite: bool,
  pub archive: Option<PathBuf>,
  pub link_creation: Option<LinkCreationMode>,
  pub pnpm_install_folder: Option<PathBuf>,
  pub output: OutputFormat,
}

/// Execute the deploy command.
///
/// Command-line flags override the scenario's link creation mode. Relative
/// `--target`, `--archive` and `--pnpm-install-folder` paths are taken from
/// the current directory.
pub fn cmd_deploy(args: DeployArgs) -> Result<()> {
  let started = Instant::now();
  let cwd = std::env::current_dir().context("Failed to read current directory")?;

  let scenario = load_scenario(&args.scenario)
    .with_context(|| format!("Failed to load scenario {}", args.scenario.display()))?;
  let source = dunce::canonicalize(&args.source)
    .with_context(|| format!("Source folder not found: {}", args.source.display()))?;
  let target = cwd.join(&args.target);
  debug!(scenario = %scenario.name, source = %source.display(), target = %target.display(), "loaded scenario");

  let mut options = scenario
    .into_options(
      args.project.as_deref(),
      &source,
      &target,
      args.pnpm_install_folder.map(|folder| cwd.join(folder)),
    )
    .context("Invalid deployment scenario")?
    .with_overwrite(args.overwrite);
  if let Some(mode) = args.link_creation {
    options = options.with_link_creation(mode);
  }
  if let Some(archive) = args.archive {
    options = options.with_archive(cwd.join(archive));
  }

  if !args.output.is_json() {
    print_info(&format!(
      "Deploying {} to {}",
      options.main_project_name,
      target.display()
    ));
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = match rt.block_on(deploy(options)) {
    Ok(report) => report,
    Err(e) => {
      if let Some(missing) = e.dependency_not_found() {
        print_error(&format!("{missing}. Make sure the dependencies are installed."));
      }
      return Err(e).context("Deployment failed");
    }
  };

  if args.output.is_json() {
    print_json(&report_json(&report))?;
  } else {
    print_summary(&report, started);
  }
  Ok(())
}

fn report_json(report: &DeployReport) -> serde_json::Value {
  serde_json::json!({
    "target": report.target_root_folder,
    "foldersCopied": report.folders_copied,
    "links": report.links,
    "metadata": report.metadata_path,
    "archive": report.archive_path,
  })
}

fn print_summary(report: &DeployReport, started: Instant) {
  print_success(&format!(
    "Deployed in {}",
    format_duration(started.elapsed())
  ));
  print_stat("Target", &report.target_root_folder.display().to_string());
  print_stat("Folders copied", &report.folders_copied.to_string());
  print_stat("Links", &report.links.to_string());
  print_stat("Metadata", &report.metadata_path.display().to_string());
  if let Some(archive) = &report.archive_path {
    print_stat("Archive", &archive.display().to_string());
  }
}
