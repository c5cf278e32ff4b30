//! Deployment orchestration.
//!
//! [`Deployer::deploy`] runs one deployment end to end:
//!
//! 1. Validate the archive path and prepare the target folder.
//! 2. Expand the main project's `additionalProjectsToInclude`.
//! 3. Crawl the dependency closure of the included projects.
//! 4. Copy every folder in the closure.
//! 5. Write `deploy-metadata.json`.
//! 6. Create links (or the link script) and bin shims.
//! 7. Copy the additional folder and zip the result.
//!
//! Every failure ends the deployment. Nothing already written is cleaned up.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::archive::{ArchiveError, create_archive};
use crate::config::{ConfigError, DeployOptions, DeployProjectConfiguration, LinkCreationMode};
use crate::consts::{BIN_DIR, NODE_MODULES_DIR};
use crate::copy::{CopyError, copy_additional_folder, copy_folders};
use crate::crawl::{CrawlError, collect_folders};
use crate::links::{
  BinLinker, LinkCreator, LinkError, NodeBinLinker, deploy_symlinks, platform_link_creator,
  write_create_links_script,
};
use crate::metadata::{DeployMetadataJson, MetadataError, write_metadata};
use crate::paths::{PathScopeError, remap_for_deploy_folder};
use crate::projects::collect_projects_to_include;
use crate::resolve::{DependencyResolver, NodeModulesResolver, ResolveError};
use crate::state::DeployState;

/// Errors that end a deployment.
#[derive(Debug, Error)]
pub enum DeployError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Crawl(#[from] CrawlError),

  #[error(transparent)]
  Copy(#[from] CopyError),

  #[error(transparent)]
  Link(#[from] LinkError),

  #[error(transparent)]
  Metadata(#[from] MetadataError),

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error(transparent)]
  Scope(#[from] PathScopeError),

  #[error("failed to prepare '{path}': {source}")]
  Prepare {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl DeployError {
  /// The unresolvable dependency that ended the deployment, if that is what happened.
  pub fn dependency_not_found(&self) -> Option<&ResolveError> {
    match self {
      DeployError::Crawl(e) => e.resolve_error().filter(|r| r.is_not_found()),
      _ => None,
    }
  }
}

/// Summary of a finished deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
  pub target_root_folder: PathBuf,
  pub folders_copied: usize,
  pub links: usize,
  pub metadata_path: PathBuf,
  pub archive_path: Option<PathBuf>,
}

/// Runs deployments with pluggable resolution and link creation.
pub struct Deployer {
  resolver: Arc<dyn DependencyResolver>,
  link_creator: Box<dyn LinkCreator>,
  bin_linker: Box<dyn BinLinker>,
}

impl Default for Deployer {
  fn default() -> Self {
    Self {
      resolver: Arc::new(NodeModulesResolver),
      link_creator: platform_link_creator(),
      bin_linker: Box::new(NodeBinLinker),
    }
  }
}

impl Deployer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
    self.resolver = resolver;
    self
  }

  pub fn with_link_creator(mut self, creator: Box<dyn LinkCreator>) -> Self {
    self.link_creator = creator;
    self
  }

  pub fn with_bin_linker(mut self, linker: Box<dyn BinLinker>) -> Self {
    self.bin_linker = linker;
    self
  }

  /// Run one deployment. Each call gets its own [`DeployState`].
  pub async fn deploy(&self, options: DeployOptions) -> Result<DeployReport, DeployError> {
    options.validate_archive_path()?;
    prepare_target_folder(&options.target_root_folder, options.overwrite_existing)?;
    let options = Arc::new(canonicalize_options(options)?);

    let state = Arc::new(DeployState::new(&options.project_configurations));
    let start_folders: Vec<PathBuf> = collect_projects_to_include(&options.main_project_name, &state)?
      .into_iter()
      .map(|project| {
        info!(project = %project.project_name, "Analyzing project");
        project.project_folder.clone()
      })
      .collect();

    collect_folders(start_folders, options.clone(), state.clone(), self.resolver.clone()).await?;

    let folders = state.folders_to_copy();
    info!(count = folders.len(), target = %options.target_root_folder.display(), "Copying folders");
    let folders_copied = folders.len();
    copy_folders(folders, options.clone(), state.clone()).await?;

    let deployed_projects: Vec<&DeployProjectConfiguration> = options
      .project_configurations
      .iter()
      .filter(|p| state.is_scheduled(&p.project_folder))
      .collect();
    let links = state.symlink_analyzer.report_symlinks();

    let metadata = DeployMetadataJson::build(&options, &deployed_projects, &links)?;
    let metadata_path = write_metadata(&options.target_root_folder, &metadata)?;

    match options.link_creation {
      LinkCreationMode::Default => {
        deploy_symlinks(&links, &options, self.link_creator.as_ref())?;
        self.link_project_bins(&options, &deployed_projects)?;
      }
      LinkCreationMode::Script => {
        write_create_links_script(&options.target_root_folder)?;
      }
      LinkCreationMode::None => {
        debug!("skipping link creation");
      }
    }

    copy_additional_folder(&options)?;
    let archive_path = create_archive(&options)?;

    info!(target = %options.target_root_folder.display(), "Deployment complete");
    Ok(DeployReport {
      target_root_folder: options.target_root_folder.clone(),
      folders_copied,
      links: links.len(),
      metadata_path,
      archive_path,
    })
  }

  fn link_project_bins(
    &self,
    options: &DeployOptions,
    projects: &[&DeployProjectConfiguration],
  ) -> Result<(), DeployError> {
    for project in projects {
      let deployed = remap_for_deploy_folder(
        &project.project_folder,
        &options.source_root_folder,
        &options.target_root_folder,
      )?;
      let node_modules = deployed.join(NODE_MODULES_DIR);
      let created = self.bin_linker.link_bins(&node_modules, &node_modules.join(BIN_DIR))?;
      debug!(project = %project.project_name, created, "linked bins");
    }
    Ok(())
  }
}

/// Run a deployment with the default resolver and link creators.
pub async fn deploy(options: DeployOptions) -> Result<DeployReport, DeployError> {
  Deployer::new().deploy(options).await
}

/// Make sure the target folder exists and is empty.
///
/// A non-empty folder is cleared only when `overwrite` is set.
pub fn prepare_target_folder(target: &Path, overwrite: bool) -> Result<(), DeployError> {
  let prepare_err = |path: &Path, source| DeployError::Prepare {
    path: path.to_path_buf(),
    source,
  };

  fs::create_dir_all(target).map_err(|e| prepare_err(target, e))?;
  let entries = fs::read_dir(target)
    .and_then(|entries| entries.map(|e| e.map(|e| e.path())).collect::<io::Result<Vec<_>>>())
    .map_err(|e| prepare_err(target, e))?;
  if entries.is_empty() {
    return Ok(());
  }
  if !overwrite {
    return Err(ConfigError::TargetNotEmpty(target.to_path_buf()).into());
  }

  info!(target = %target.display(), "Deleting target folder contents");
  for entry in entries {
    let is_real_dir = fs::symlink_metadata(&entry).map(|m| m.is_dir()).unwrap_or(false);
    let removed = if is_real_dir {
      fs::remove_dir_all(&entry)
    } else {
      fs::remove_file(&entry).or_else(|e| {
        // Windows junctions are removed as directories.
        if cfg!(windows) { fs::remove_dir(&entry) } else { Err(e) }
      })
    };
    match removed {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(prepare_err(&entry, e)),
    }
  }
  Ok(())
}

/// Resolve the roots and project folders to real paths, so they compare
/// equal to the real folders found by the crawl.
fn canonicalize_options(mut options: DeployOptions) -> Result<DeployOptions, DeployError> {
  let real = |path: &Path| {
    dunce::canonicalize(path).map_err(|source| DeployError::Prepare {
      path: path.to_path_buf(),
      source,
    })
  };

  options.source_root_folder = real(&options.source_root_folder)?;
  options.target_root_folder = real(&options.target_root_folder)?;
  if let Some(folder) = &options.pnpm_install_folder {
    options.pnpm_install_folder = Some(dunce::canonicalize(folder).unwrap_or_else(|_| folder.clone()));
  }
  for project in &mut options.project_configurations {
    if let Ok(folder) = dunce::canonicalize(&project.project_folder) {
      project.project_folder = folder;
    }
  }
  Ok(options)
}
