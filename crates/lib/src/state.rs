//! Per-run deployment state.
//!
//! A fresh [`DeployState`] is created for every deployment and dropped when it
//! ends, so several deployments can run in one process without interfering.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::config::DeployProjectConfiguration;
use crate::symlink::SymlinkAnalyzer;

#[derive(Debug)]
pub struct DeployState {
  /// Real folder paths scheduled for copy. Entries are never removed.
  folders_to_copy: Mutex<BTreeSet<PathBuf>>,
  by_name: HashMap<String, DeployProjectConfiguration>,
  by_folder: HashMap<PathBuf, DeployProjectConfiguration>,
  pub symlink_analyzer: SymlinkAnalyzer,
}

impl DeployState {
  pub fn new(project_configurations: &[DeployProjectConfiguration]) -> Self {
    Self {
      folders_to_copy: Mutex::new(BTreeSet::new()),
      by_name: project_configurations
        .iter()
        .map(|p| (p.project_name.clone(), p.clone()))
        .collect(),
      by_folder: project_configurations
        .iter()
        .map(|p| (p.project_folder.clone(), p.clone()))
        .collect(),
      symlink_analyzer: SymlinkAnalyzer::new(),
    }
  }

  /// Schedule a real folder for copy.
  ///
  /// Returns `false` when the folder was already scheduled. The check and the
  /// insert happen under one lock, so each folder is claimed exactly once.
  pub fn try_schedule_folder(&self, real_folder: &Path) -> bool {
    self
      .folders_to_copy
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(real_folder.to_path_buf())
  }

  pub fn is_scheduled(&self, real_folder: &Path) -> bool {
    self
      .folders_to_copy
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .contains(real_folder)
  }

  /// Snapshot of the scheduled folders, sorted.
  pub fn folders_to_copy(&self) -> Vec<PathBuf> {
    self
      .folders_to_copy
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .cloned()
      .collect()
  }

  pub fn project_by_name(&self, name: &str) -> Option<&DeployProjectConfiguration> {
    self.by_name.get(name)
  }

  pub fn project_by_folder(&self, folder: &Path) -> Option<&DeployProjectConfiguration> {
    self.by_folder.get(folder)
  }
}
