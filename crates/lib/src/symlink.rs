//! Symlink bookkeeping shared by resolution and copying.
//!
//! Every path handed to [`SymlinkAnalyzer::analyze_path`] is walked one
//! component at a time. Each component that is a symbolic link (or a Windows
//! junction) is recorded as a [`LinkInfo`] pointing at its real target, and
//! the walk continues from that target. At the end of a deployment the
//! recorded links are recreated inside the target folder.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Errors raised while inspecting a path.
#[derive(Debug, Error)]
pub enum SymlinkError {
  #[error("failed to stat '{path}': {source}")]
  Stat {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to resolve link '{path}': {source}")]
  Resolve {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Whether a link points at a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkKind {
  FileLink,
  FolderLink,
}

/// A recorded symlink, junction or hard link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInfo {
  pub kind: LinkKind,
  /// Where the link lives.
  pub link_path: PathBuf,
  /// The real path the link resolves to.
  pub target_path: PathBuf,
}

/// Classification of the final component of an analyzed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathNodeKind {
  File,
  Folder,
  Link,
}

/// Result of [`SymlinkAnalyzer::analyze_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNode {
  pub kind: PathNodeKind,
  /// The analyzed path as given.
  pub path: PathBuf,
  /// The real path once every link along the way is followed.
  pub real_path: PathBuf,
}

impl PathNode {
  pub fn is_link(&self) -> bool {
    self.kind == PathNodeKind::Link
  }
}

#[derive(Debug, Default)]
struct AnalyzerState {
  nodes: HashMap<PathBuf, PathNode>,
  links: BTreeMap<PathBuf, LinkInfo>,
}

/// Registry of links observed during a deployment.
///
/// Safe to share between concurrent crawl and copy tasks.
#[derive(Debug, Default)]
pub struct SymlinkAnalyzer {
  state: Mutex<AnalyzerState>,
}

impl SymlinkAnalyzer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Classify `path`, registering every link between the filesystem root and it.
  pub fn analyze_path(&self, path: &Path) -> Result<PathNode, SymlinkError> {
    if let Some(node) = self.lock().nodes.get(path) {
      return Ok(node.clone());
    }

    let mut current = PathBuf::new();
    let mut last_was_link = false;
    let mut found = Vec::new();

    for component in path.components() {
      current.push(component.as_os_str());
      if current.parent().is_none() {
        // root or prefix
        continue;
      }

      let metadata = fs::symlink_metadata(&current).map_err(|source| SymlinkError::Stat {
        path: current.clone(),
        source,
      })?;

      last_was_link = metadata.file_type().is_symlink();
      if !last_was_link {
        continue;
      }

      let target = dunce::canonicalize(&current).map_err(|source| SymlinkError::Resolve {
        path: current.clone(),
        source,
      })?;
      let kind = if target.is_dir() {
        LinkKind::FolderLink
      } else {
        LinkKind::FileLink
      };
      trace!(link = %current.display(), target = %target.display(), "observed link");
      found.push(LinkInfo {
        kind,
        link_path: current.clone(),
        target_path: target.clone(),
      });
      current = target;
    }

    let kind = if last_was_link {
      PathNodeKind::Link
    } else if current.is_dir() {
      PathNodeKind::Folder
    } else {
      PathNodeKind::File
    };
    let node = PathNode {
      kind,
      path: path.to_path_buf(),
      real_path: current,
    };

    let mut state = self.lock();
    for link in found {
      state.links.entry(link.link_path.clone()).or_insert(link);
    }
    state.nodes.insert(path.to_path_buf(), node.clone());
    Ok(node)
  }

  /// All recorded links, ordered by link path.
  pub fn report_symlinks(&self) -> Vec<LinkInfo> {
    self.lock().links.values().cloned().collect()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, AnalyzerState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
