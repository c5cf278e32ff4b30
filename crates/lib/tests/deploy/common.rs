//! Shared helpers for deployment tests.

use std::fs;
use std::path::{Path, PathBuf};

use nodeploy_lib::metadata::{DeployMetadataJson, load_metadata};
use nodeploy_lib::{DeployOptions, DeployProjectConfiguration};
use tempfile::TempDir;

/// A throwaway monorepo with a sibling deployment folder.
pub struct TestRepo {
  _temp: TempDir,
  root: PathBuf,
}

impl TestRepo {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    fs::create_dir_all(root.join("repo")).unwrap();
    Self { _temp: temp, root }
  }

  /// The monorepo root.
  pub fn source(&self) -> PathBuf {
    self.root.join("repo")
  }

  /// The deployment folder (not created).
  pub fn target(&self) -> PathBuf {
    self.root.join("deploy")
  }

  /// Somewhere outside both trees.
  pub fn scratch(&self, relative: &str) -> PathBuf {
    self.root.join("scratch").join(relative)
  }

  /// Write `<repo>/<folder>/package.json`.
  pub fn package(&self, folder: &str, json: &str) -> PathBuf {
    let folder = self.source().join(folder);
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("package.json"), json).unwrap();
    folder
  }

  /// Write a file under the repo.
  pub fn file(&self, relative: &str, content: &str) {
    let path = self.source().join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  /// Create `<repo>/<link>` pointing at `target` (relative to the link's folder).
  #[cfg(unix)]
  pub fn symlink(&self, link: &str, target: &str) {
    let link = self.source().join(link);
    fs::create_dir_all(link.parent().unwrap()).unwrap();
    std::os::unix::fs::symlink(target, link).unwrap();
  }

  pub fn project(&self, name: &str, folder: &str) -> DeployProjectConfiguration {
    DeployProjectConfiguration::new(name, self.source().join(folder))
  }

  pub fn options(&self, main: &str, projects: Vec<DeployProjectConfiguration>) -> DeployOptions {
    DeployOptions::new(main, self.source(), self.target(), projects)
  }

  pub fn deployed(&self, relative: &str) -> PathBuf {
    self.target().join(relative)
  }

  pub fn metadata(&self) -> DeployMetadataJson {
    load_metadata(&self.target()).unwrap()
  }
}

/// Project paths listed in the metadata.
pub fn project_paths(metadata: &DeployMetadataJson) -> Vec<&str> {
  metadata.projects.iter().map(|p| p.path.as_str()).collect()
}

pub fn is_empty_dir(path: &Path) -> bool {
  fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(false)
}
