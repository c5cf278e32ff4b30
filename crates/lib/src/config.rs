//! Deployment run configuration.
//!
//! [`DeployOptions`] is immutable once a deployment starts. Per-project
//! settings live in [`DeployProjectConfiguration`] and are supplied by the
//! caller, usually from a scenario file (see [`crate::scenario`]).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{ARCHIVE_EXTENSION, DEFAULT_CONCURRENCY};
use crate::package_json::PackageJson;

/// Bad input from the caller. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The main project is not among the configured projects.
  #[error("main project \"{0}\" was not found in the list of projects")]
  MainProjectNotFound(String),

  /// An `additionalProjectsToInclude` entry names an unknown project.
  #[error("project \"{name}\" (included by \"{included_by}\") was not found in the list of projects")]
  ProjectNotFound { name: String, included_by: String },

  /// The archive path does not end in `.zip`.
  #[error("only archives with the .zip file extension are supported: {0}")]
  UnsupportedArchiveExtension(PathBuf),

  /// The target folder has content and overwriting was not requested.
  #[error("the deploy target folder '{0}' is not empty; overwrite must be explicitly requested")]
  TargetNotEmpty(PathBuf),

  /// Unknown link creation mode text.
  #[error("invalid link creation mode '{0}' (expected default, script or none)")]
  InvalidLinkCreation(String),
}

/// How links observed during the crawl are reproduced in the target folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkCreationMode {
  /// Create the links after all files are copied.
  #[default]
  Default,
  /// Write `create-links.js` so links can be created on the server later.
  Script,
  /// Do nothing; another tool creates links from `deploy-metadata.json`.
  None,
}

impl LinkCreationMode {
  pub fn as_str(self) -> &'static str {
    match self {
      LinkCreationMode::Default => "default",
      LinkCreationMode::Script => "script",
      LinkCreationMode::None => "none",
    }
  }
}

impl fmt::Display for LinkCreationMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for LinkCreationMode {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "default" => Ok(LinkCreationMode::Default),
      "script" => Ok(LinkCreationMode::Script),
      "none" => Ok(LinkCreationMode::None),
      other => Err(ConfigError::InvalidLinkCreation(other.to_string())),
    }
  }
}

/// Rewrites a manifest before its dependencies are inspected.
///
/// Returning `None` keeps the original manifest.
pub type PackageJsonTransform = Arc<dyn Fn(PackageJson) -> Option<PackageJson> + Send + Sync>;

/// Deployment settings for one first-class project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployProjectConfiguration {
  /// Unique project name.
  pub project_name: String,
  /// Absolute project folder.
  pub project_folder: PathBuf,
  /// Other projects deployed alongside this one.
  pub additional_projects_to_include: Vec<String>,
  /// Dependency names added to the candidate set even if undeclared.
  pub additional_dependencies_to_include: Vec<String>,
  /// `*` patterns for dependency names to drop.
  pub dependencies_to_exclude: Vec<String>,
}

impl DeployProjectConfiguration {
  pub fn new(project_name: impl Into<String>, project_folder: impl Into<PathBuf>) -> Self {
    Self {
      project_name: project_name.into(),
      project_folder: project_folder.into(),
      additional_projects_to_include: Vec::new(),
      additional_dependencies_to_include: Vec::new(),
      dependencies_to_exclude: Vec::new(),
    }
  }

  pub fn with_additional_projects<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.additional_projects_to_include = names.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_additional_dependencies<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.additional_dependencies_to_include = names.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_dependencies_to_exclude<I, S>(mut self, patterns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.dependencies_to_exclude = patterns.into_iter().map(Into::into).collect();
    self
  }
}

/// Options for a single deployment run.
#[derive(Clone)]
pub struct DeployOptions {
  /// The main project to deploy.
  pub main_project_name: String,
  /// Free-form label recorded in `deploy-metadata.json`.
  pub scenario_name: String,
  /// Folder that copying originates from, usually the repo root.
  pub source_root_folder: PathBuf,
  /// Folder the deployment is written to.
  pub target_root_folder: PathBuf,
  /// Clear a non-empty target folder instead of failing.
  pub overwrite_existing: bool,
  /// Zip the finished target folder to this path.
  pub create_archive_file_path: Option<PathBuf>,
  /// Applied to every manifest before its dependencies are collected.
  pub transform_package_json: Option<PackageJsonTransform>,
  /// Follow `devDependencies` too.
  pub include_dev_dependencies: bool,
  /// Copy project folders whole instead of using the packlist.
  pub include_npm_ignore_files: bool,
  /// Folder holding pnpm's `node_modules`; enables workaround-link handling.
  pub pnpm_install_folder: Option<PathBuf>,
  pub link_creation: LinkCreationMode,
  /// Extra folder (relative to the source root) copied into the target root.
  pub folder_to_copy: Option<PathBuf>,
  pub project_configurations: Vec<DeployProjectConfiguration>,
  /// Ceiling on concurrent folder analyses and copies.
  pub concurrency: usize,
}

impl DeployOptions {
  pub fn new(
    main_project_name: impl Into<String>,
    source_root_folder: impl Into<PathBuf>,
    target_root_folder: impl Into<PathBuf>,
    project_configurations: Vec<DeployProjectConfiguration>,
  ) -> Self {
    Self {
      main_project_name: main_project_name.into(),
      scenario_name: "default".to_string(),
      source_root_folder: source_root_folder.into(),
      target_root_folder: target_root_folder.into(),
      overwrite_existing: false,
      create_archive_file_path: None,
      transform_package_json: None,
      include_dev_dependencies: false,
      include_npm_ignore_files: false,
      pnpm_install_folder: None,
      link_creation: LinkCreationMode::Default,
      folder_to_copy: None,
      project_configurations,
      concurrency: DEFAULT_CONCURRENCY,
    }
  }

  pub fn with_scenario_name(mut self, name: impl Into<String>) -> Self {
    self.scenario_name = name.into();
    self
  }

  pub fn with_overwrite(mut self, overwrite: bool) -> Self {
    self.overwrite_existing = overwrite;
    self
  }

  pub fn with_archive(mut self, path: impl Into<PathBuf>) -> Self {
    self.create_archive_file_path = Some(path.into());
    self
  }

  pub fn with_transform<F>(mut self, transform: F) -> Self
  where
    F: Fn(PackageJson) -> Option<PackageJson> + Send + Sync + 'static,
  {
    self.transform_package_json = Some(Arc::new(transform));
    self
  }

  pub fn with_dev_dependencies(mut self, include: bool) -> Self {
    self.include_dev_dependencies = include;
    self
  }

  pub fn with_npm_ignore_files(mut self, include: bool) -> Self {
    self.include_npm_ignore_files = include;
    self
  }

  pub fn with_pnpm_install_folder(mut self, folder: impl Into<PathBuf>) -> Self {
    self.pnpm_install_folder = Some(folder.into());
    self
  }

  pub fn with_link_creation(mut self, mode: LinkCreationMode) -> Self {
    self.link_creation = mode;
    self
  }

  pub fn with_folder_to_copy(mut self, folder: impl Into<PathBuf>) -> Self {
    self.folder_to_copy = Some(folder.into());
    self
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  /// Apply the configured manifest transform, if any.
  pub fn transform(&self, package_json: PackageJson) -> PackageJson {
    match &self.transform_package_json {
      Some(transform) => transform(package_json.clone()).unwrap_or(package_json),
      None => package_json,
    }
  }

  /// Fail unless the archive path (if any) has the supported extension.
  pub fn validate_archive_path(&self) -> Result<(), ConfigError> {
    match &self.create_archive_file_path {
      Some(path) if !has_archive_extension(path) => Err(ConfigError::UnsupportedArchiveExtension(path.clone())),
      _ => Ok(()),
    }
  }
}

impl fmt::Debug for DeployOptions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DeployOptions")
      .field("main_project_name", &self.main_project_name)
      .field("scenario_name", &self.scenario_name)
      .field("source_root_folder", &self.source_root_folder)
      .field("target_root_folder", &self.target_root_folder)
      .field("overwrite_existing", &self.overwrite_existing)
      .field("create_archive_file_path", &self.create_archive_file_path)
      .field("transform_package_json", &self.transform_package_json.is_some())
      .field("include_dev_dependencies", &self.include_dev_dependencies)
      .field("include_npm_ignore_files", &self.include_npm_ignore_files)
      .field("pnpm_install_folder", &self.pnpm_install_folder)
      .field("link_creation", &self.link_creation)
      .field("folder_to_copy", &self.folder_to_copy)
      .field("project_configurations", &self.project_configurations)
      .field("concurrency", &self.concurrency)
      .finish()
  }
}

fn has_archive_extension(path: &Path) -> bool {
  path.extension().and_then(|e| e.to_str()) == Some(ARCHIVE_EXTENSION)
}
