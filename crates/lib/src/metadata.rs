//! `deploy-metadata.json`, written at the root of every deployment.
//!
//! All paths in the document are relative to the deployment root and use
//! forward slashes, so the file is portable between hosts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{DeployOptions, DeployProjectConfiguration};
use crate::consts::DEPLOY_METADATA_FILENAME;
use crate::paths::{PathScopeError, remap_for_deploy_metadata};
use crate::symlink::{LinkInfo, LinkKind};

#[derive(Debug, Error)]
pub enum MetadataError {
  #[error(transparent)]
  Scope(#[from] PathScopeError),

  #[error("failed to serialize deployment metadata: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployMetadataJson {
  pub scenario_name: String,
  pub main_project_name: String,
  pub projects: Vec<ProjectInfoJson>,
  pub links: Vec<LinkInfoJson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfoJson {
  /// Project folder relative to the deployment root.
  pub path: String,
}

/// A link as recorded in the metadata, relative to the deployment root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInfoJson {
  pub kind: LinkKind,
  pub link_path: String,
  pub target_path: String,
}

impl DeployMetadataJson {
  /// Describe a finished crawl.
  ///
  /// `projects` are the configured projects that ended up in the closure;
  /// `links` are every link the analyzer recorded.
  pub fn build(
    options: &DeployOptions,
    projects: &[&DeployProjectConfiguration],
    links: &[LinkInfo],
  ) -> Result<Self, PathScopeError> {
    let root = &options.source_root_folder;

    let projects = projects
      .iter()
      .map(|p| {
        Ok(ProjectInfoJson {
          path: remap_for_deploy_metadata(&p.project_folder, root)?,
        })
      })
      .collect::<Result<Vec<_>, PathScopeError>>()?;

    let links = links
      .iter()
      .map(|l| {
        Ok(LinkInfoJson {
          kind: l.kind,
          link_path: remap_for_deploy_metadata(&l.link_path, root)?,
          target_path: remap_for_deploy_metadata(&l.target_path, root)?,
        })
      })
      .collect::<Result<Vec<_>, PathScopeError>>()?;

    Ok(Self {
      scenario_name: options.scenario_name.clone(),
      main_project_name: options.main_project_name.clone(),
      projects,
      links,
    })
  }
}

impl LinkInfoJson {
  /// Absolute link and target paths under `target_root`.
  pub fn resolve(&self, target_root: &Path) -> LinkInfo {
    LinkInfo {
      kind: self.kind,
      link_path: target_root.join(&self.link_path),
      target_path: target_root.join(&self.target_path),
    }
  }
}

/// Write `deploy-metadata.json` (pretty-printed) into `target_root`.
pub fn write_metadata(target_root: &Path, metadata: &DeployMetadataJson) -> Result<PathBuf, MetadataError> {
  let path = target_root.join(DEPLOY_METADATA_FILENAME);
  let mut json = serde_json::to_string_pretty(metadata).map_err(MetadataError::Serialize)?;
  json.push('\n');
  fs::write(&path, json).map_err(|source| MetadataError::Write {
    path: path.clone(),
    source,
  })?;
  debug!(path = %path.display(), projects = metadata.projects.len(), links = metadata.links.len(), "wrote deploy metadata");
  Ok(path)
}

/// Read `deploy-metadata.json` back from a deployment.
pub fn load_metadata(target_root: &Path) -> Result<DeployMetadataJson, MetadataError> {
  let path = target_root.join(DEPLOY_METADATA_FILENAME);
  let content = fs::read_to_string(&path).map_err(|source| MetadataError::Read {
    path: path.clone(),
    source,
  })?;
  serde_json::from_str(&content).map_err(|source| MetadataError::Parse { path, source })
}
