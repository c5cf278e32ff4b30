//! Recreating observed links inside a deployment.
//!
//! Links recorded by the [`SymlinkAnalyzer`](crate::symlink::SymlinkAnalyzer)
//! are remapped into the target folder and created there once every file has
//! been copied. Link offsets are always recomputed from the new location.
//!
//! A link whose target is itself a link that has not been created yet fails
//! with [`LinkError::TargetMissing`]; links are not reordered.

pub mod bin;
pub mod creator;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::DeployOptions;
use crate::consts::CREATE_LINKS_SCRIPT_FILENAME;
use crate::metadata::{MetadataError, load_metadata};
use crate::package_json::PackageJsonError;
use crate::paths::{PathScopeError, remap_for_deploy_folder};
use crate::symlink::{LinkInfo, LinkKind};

pub use bin::{BinLinker, NodeBinLinker};
#[cfg(windows)]
pub use creator::JunctionCreator;
#[cfg(unix)]
pub use creator::SymlinkCreator;
pub use creator::{LinkCreator, platform_link_creator};

const CREATE_LINKS_SCRIPT: &str = include_str!("../../scripts/create-links.js");

#[derive(Debug, Error)]
pub enum LinkError {
  /// The link points at something not present in the target yet.
  #[error(
    "cannot create link '{link_path}': target '{target_path}' does not exist yet (links to other links are not supported)"
  )]
  TargetMissing { link_path: PathBuf, target_path: PathBuf },

  #[error("failed to create link '{path}': {source}")]
  Create {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove link '{path}': {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write '{path}': {source}")]
  WriteScript {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to link bins at '{path}': {source}")]
  Bin {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Scope(#[from] PathScopeError),

  #[error(transparent)]
  Metadata(#[from] MetadataError),

  #[error(transparent)]
  PackageJson(#[from] PackageJsonError),
}

/// Remap a recorded source link into the target folder and create it.
pub fn deploy_symlink(link: &LinkInfo, options: &DeployOptions, creator: &dyn LinkCreator) -> Result<(), LinkError> {
  let source_root = &options.source_root_folder;
  let target_root = &options.target_root_folder;
  let remapped = LinkInfo {
    kind: link.kind,
    link_path: remap_for_deploy_folder(&link.link_path, source_root, target_root)?,
    target_path: remap_for_deploy_folder(&link.target_path, source_root, target_root)?,
  };
  create_link(&remapped, creator)
}

/// Create every recorded link in the target folder, in link-path order.
pub fn deploy_symlinks(links: &[LinkInfo], options: &DeployOptions, creator: &dyn LinkCreator) -> Result<(), LinkError> {
  for link in links {
    deploy_symlink(link, options, creator)?;
  }
  if !links.is_empty() {
    info!(count = links.len(), "Created links");
  }
  Ok(())
}

/// Create one link whose paths are already absolute in the target tree.
pub fn create_link(link: &LinkInfo, creator: &dyn LinkCreator) -> Result<(), LinkError> {
  if !link.target_path.exists() {
    return Err(LinkError::TargetMissing {
      link_path: link.link_path.clone(),
      target_path: link.target_path.clone(),
    });
  }

  let create_err = |source| LinkError::Create {
    path: link.link_path.clone(),
    source,
  };
  if let Some(parent) = link.link_path.parent() {
    fs::create_dir_all(parent).map_err(create_err)?;
  }
  match link.kind {
    LinkKind::FolderLink => creator.create_folder_link(&link.link_path, &link.target_path),
    LinkKind::FileLink => creator.create_file_link(&link.link_path, &link.target_path),
  }
  .map_err(create_err)?;

  debug!(link = %link.link_path.display(), target = %link.target_path.display(), "created link");
  Ok(())
}

/// Write the deferred link creation script into the target root.
pub fn write_create_links_script(target_root: &Path) -> Result<PathBuf, LinkError> {
  let path = target_root.join(CREATE_LINKS_SCRIPT_FILENAME);
  fs::write(&path, CREATE_LINKS_SCRIPT).map_err(|source| LinkError::WriteScript {
    path: path.clone(),
    source,
  })?;
  info!(path = %path.display(), "Wrote link creation script");
  Ok(path)
}

/// Create the links listed in a deployment's metadata.
///
/// Links that already exist are skipped, so the command can be re-run.
/// Returns the number of links created.
pub fn create_links(target_root: &Path, creator: &dyn LinkCreator) -> Result<usize, LinkError> {
  let metadata = load_metadata(target_root)?;
  let mut created = 0;
  for link in &metadata.links {
    let link = link.resolve(target_root);
    if fs::symlink_metadata(&link.link_path).is_ok() {
      debug!(link = %link.link_path.display(), "link already exists");
      continue;
    }
    create_link(&link, creator)?;
    created += 1;
  }
  Ok(created)
}

/// Remove the links listed in a deployment's metadata.
///
/// Missing links are skipped. Returns the number of links removed.
pub fn remove_links(target_root: &Path) -> Result<usize, LinkError> {
  let metadata = load_metadata(target_root)?;
  let mut removed = 0;
  for link in &metadata.links {
    let link = link.resolve(target_root);
    match fs::symlink_metadata(&link.link_path) {
      Ok(_) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
      Err(source) => {
        return Err(LinkError::Remove {
          path: link.link_path,
          source,
        });
      }
    }

    remove_link(&link).map_err(|source| LinkError::Remove {
      path: link.link_path.clone(),
      source,
    })?;
    debug!(link = %link.link_path.display(), "removed link");
    removed += 1;
  }
  Ok(removed)
}

#[cfg(windows)]
fn remove_link(link: &LinkInfo) -> io::Result<()> {
  match link.kind {
    LinkKind::FolderLink => fs::remove_dir(&link.link_path),
    LinkKind::FileLink => fs::remove_file(&link.link_path),
  }
}

#[cfg(unix)]
fn remove_link(link: &LinkInfo) -> io::Result<()> {
  fs::remove_file(&link.link_path)
}
