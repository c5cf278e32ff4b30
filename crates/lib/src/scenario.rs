//! Deployment scenario files.
//!
//! A scenario names the projects that may be deployed and carries their
//! per-project settings:
//!
//! ```json
//! {
//!   "deploymentProjectNames": ["app"],
//!   "linkCreation": "default",
//!   "projects": [
//!     { "projectName": "app", "projectFolder": "apps/app",
//!       "dependenciesToExclude": ["@types/*"] }
//!   ]
//! }
//! ```
//!
//! Project folders are relative to the source root. The scenario name comes
//! from the file name: `deploy.json` is `default`, `deploy-<name>.json` is
//! `<name>`.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::{ConfigError, DeployOptions, DeployProjectConfiguration, LinkCreationMode};

#[derive(Debug, Error)]
pub enum ScenarioError {
  #[error("failed to read scenario '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse scenario '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("project \"{0}\" is configured more than once")]
  DuplicateProject(String),

  #[error("deployment project \"{0}\" has no entry in \"projects\"")]
  UnknownDeploymentProject(String),

  #[error("project \"{0}\" is not listed in \"deploymentProjectNames\"")]
  NotADeploymentProject(String),

  #[error("the scenario lists several deployment projects; choose one explicitly")]
  MainProjectRequired,

  #[error(transparent)]
  Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
  /// Derived from the file name.
  #[serde(skip)]
  pub name: String,

  #[serde(default)]
  pub deployment_project_names: Vec<String>,

  #[serde(default)]
  pub include_dev_dependencies: bool,

  #[serde(default)]
  pub include_npm_ignore_files: bool,

  /// Skip workaround-link handling even when a pnpm install folder is known.
  #[serde(default)]
  pub omit_pnpm_workaround_links: bool,

  #[serde(default)]
  pub link_creation: Option<String>,

  /// Relative to the source root.
  #[serde(default)]
  pub folder_to_copy: Option<PathBuf>,

  #[serde(default)]
  pub projects: Vec<ScenarioProject>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioProject {
  pub project_name: String,

  /// Relative to the source root.
  pub project_folder: PathBuf,

  #[serde(default)]
  pub additional_projects_to_include: Vec<String>,

  #[serde(default)]
  pub additional_dependencies_to_include: Vec<String>,

  #[serde(default)]
  pub dependencies_to_exclude: Vec<String>,
}

/// Load and validate a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
  let content = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let mut scenario: Scenario = serde_json::from_str(&content).map_err(|source| ScenarioError::Parse {
    path: path.to_path_buf(),
    source,
  })?;
  scenario.name = scenario_name_from_path(path);
  scenario.validate()?;
  Ok(scenario)
}

fn scenario_name_from_path(path: &Path) -> String {
  let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
  match stem {
    "deploy" | "" => "default".to_string(),
    other => other.strip_prefix("deploy-").unwrap_or(other).to_string(),
  }
}

impl Scenario {
  pub fn validate(&self) -> Result<(), ScenarioError> {
    let mut names = HashSet::new();
    for project in &self.projects {
      if !names.insert(project.project_name.as_str()) {
        return Err(ScenarioError::DuplicateProject(project.project_name.clone()));
      }
    }
    for name in &self.deployment_project_names {
      if !names.contains(name.as_str()) {
        return Err(ScenarioError::UnknownDeploymentProject(name.clone()));
      }
    }
    self.link_creation_mode()?;
    Ok(())
  }

  pub fn link_creation_mode(&self) -> Result<LinkCreationMode, ConfigError> {
    match &self.link_creation {
      Some(text) => text.parse(),
      None => Ok(LinkCreationMode::default()),
    }
  }

  /// The main project used when none is given: the only deployment project.
  pub fn default_project_name(&self) -> Option<&str> {
    match self.deployment_project_names.as_slice() {
      [only] => Some(only.as_str()),
      _ => None,
    }
  }

  /// Build deployment options for `main_project_name` (or the default one).
  pub fn into_options(
    self,
    main_project_name: Option<&str>,
    source_root_folder: &Path,
    target_root_folder: &Path,
    pnpm_install_folder: Option<PathBuf>,
  ) -> Result<DeployOptions, ScenarioError> {
    let main = match main_project_name {
      Some(name) => name.to_string(),
      None => self
        .default_project_name()
        .ok_or(ScenarioError::MainProjectRequired)?
        .to_string(),
    };
    if !self.projects.iter().any(|p| p.project_name == main) {
      return Err(ConfigError::MainProjectNotFound(main).into());
    }
    if !self.deployment_project_names.is_empty() && !self.deployment_project_names.contains(&main) {
      return Err(ScenarioError::NotADeploymentProject(main));
    }

    let link_creation = self.link_creation_mode()?;
    let projects = self
      .projects
      .into_iter()
      .map(|p| {
        DeployProjectConfiguration::new(p.project_name, source_root_folder.join(p.project_folder))
          .with_additional_projects(p.additional_projects_to_include)
          .with_additional_dependencies(p.additional_dependencies_to_include)
          .with_dependencies_to_exclude(p.dependencies_to_exclude)
      })
      .collect();

    let mut options = DeployOptions::new(main, source_root_folder, target_root_folder, projects)
      .with_scenario_name(self.name)
      .with_dev_dependencies(self.include_dev_dependencies)
      .with_npm_ignore_files(self.include_npm_ignore_files)
      .with_link_creation(link_creation);
    if let Some(folder) = self.folder_to_copy {
      options = options.with_folder_to_copy(folder);
    }
    if let Some(folder) = pnpm_install_folder.filter(|_| !self.omit_pnpm_workaround_links) {
      options = options.with_pnpm_install_folder(folder);
    }
    Ok(options)
  }
}
