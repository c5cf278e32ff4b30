//! Copying scheduled folders into the deployment.
//!
//! Folders of configured projects are copied file by file from their packlist
//! (see [`crate::packlist`]) unless ignore files are explicitly included.
//! Every other folder is copied whole, minus a root `node_modules` and VCS
//! metadata. Links found along the way are never copied physically: they are
//! registered with the [`SymlinkAnalyzer`](crate::symlink::SymlinkAnalyzer)
//! and recreated later.
//!
//! Every file is written with create-new semantics. The target starts empty,
//! so an existing destination means two sources mapped to the same path.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::config::DeployOptions;
use crate::consts::NODE_MODULES_DIR;
use crate::package_json::{PackageJson, PackageJsonError};
use crate::packlist::{PacklistError, package_files};
use crate::paths::{PathScopeError, remap_for_deploy_folder};
use crate::state::DeployState;
use crate::symlink::SymlinkError;

/// Skipped anywhere in a folder copied whole.
const EXCLUDED_NAMES: &[&str] = &[".git", ".svn", ".hg", ".DS_Store"];

#[derive(Debug, Error)]
pub enum CopyError {
  #[error("failed to copy '{from}' to '{to}': {source}")]
  CopyFile {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create directory '{path}': {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk '{path}': {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error(transparent)]
  Packlist(#[from] PacklistError),

  #[error(transparent)]
  PackageJson(#[from] PackageJsonError),

  #[error(transparent)]
  Scope(#[from] PathScopeError),

  #[error(transparent)]
  Symlink(#[from] SymlinkError),

  #[error("folder copy task failed: {0}")]
  Task(#[from] JoinError),

  #[error("copy pool closed: {0}")]
  PoolClosed(#[from] AcquireError),
}

/// Copy every scheduled folder, at most `options.concurrency` at a time.
///
/// The first failure cancels copies that have not started yet.
pub async fn copy_folders(
  folders: Vec<PathBuf>,
  options: Arc<DeployOptions>,
  state: Arc<DeployState>,
) -> Result<(), CopyError> {
  let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
  let mut join_set = JoinSet::new();

  for folder in folders {
    let options = options.clone();
    let state = state.clone();
    let semaphore = semaphore.clone();

    join_set.spawn(deploy_folder_with_permit(folder, options, state, semaphore));
  }

  while let Some(joined) = join_set.join_next().await {
    let result = joined.map_err(CopyError::from).and_then(|r| r);
    if let Err(e) = result {
      join_set.abort_all();
      return Err(e);
    }
  }
  Ok(())
}

async fn deploy_folder_with_permit(
  folder: PathBuf,
  options: Arc<DeployOptions>,
  state: Arc<DeployState>,
  semaphore: Arc<Semaphore>,
) -> Result<(), CopyError> {
  let _permit = semaphore.acquire_owned().await?;
  tokio::task::spawn_blocking(move || deploy_folder(&folder, &options, &state)).await?
}

/// Copy one real folder into the target tree.
pub fn deploy_folder(source_folder: &Path, options: &DeployOptions, state: &DeployState) -> Result<(), CopyError> {
  let use_packlist = state.project_by_folder(source_folder).is_some() && !options.include_npm_ignore_files;
  debug!(
    folder = %source_folder.display(),
    mode = if use_packlist { "packlist" } else { "tree" },
    "copying folder"
  );

  if use_packlist {
    copy_packlist(source_folder, options, state)
  } else {
    copy_tree(source_folder, options, state)
  }
}

fn copy_packlist(source_folder: &Path, options: &DeployOptions, state: &DeployState) -> Result<(), CopyError> {
  let package_json = PackageJson::load(source_folder)?;

  for relative in package_files(source_folder, &package_json)? {
    let from = source_folder.join(&relative);
    if state.symlink_analyzer.analyze_path(&from)?.is_link() {
      trace!(path = %from.display(), "leaving link for later");
      continue;
    }
    let to = remap_for_deploy_folder(&from, &options.source_root_folder, &options.target_root_folder)?;
    copy_file(&from, &to)?;
  }
  Ok(())
}

fn copy_tree(source_folder: &Path, options: &DeployOptions, state: &DeployState) -> Result<(), CopyError> {
  let walker = WalkDir::new(source_folder)
    .follow_links(false)
    .into_iter()
    .filter_entry(|entry| !is_excluded(entry));

  for entry in walker {
    let entry = entry.map_err(|source| CopyError::Walk {
      path: source_folder.to_path_buf(),
      source,
    })?;
    let from = entry.path();

    if entry.path_is_symlink() {
      state.symlink_analyzer.analyze_path(from)?;
      continue;
    }

    let to = remap_for_deploy_folder(from, &options.source_root_folder, &options.target_root_folder)?;
    if entry.file_type().is_dir() {
      create_dir(&to)?;
    } else {
      copy_file(from, &to)?;
    }
  }
  Ok(())
}

fn is_excluded(entry: &walkdir::DirEntry) -> bool {
  let name = entry.file_name();
  (entry.depth() == 1 && name == NODE_MODULES_DIR) || EXCLUDED_NAMES.iter().any(|excluded| name == *excluded)
}

/// Copy `folder_to_copy` (relative to the source root) into the target root.
///
/// Fails on any collision with files already deployed.
pub fn copy_additional_folder(options: &DeployOptions) -> Result<(), CopyError> {
  let Some(folder) = &options.folder_to_copy else {
    return Ok(());
  };
  let source = options.source_root_folder.join(folder);
  debug!(folder = %source.display(), "copying additional folder");

  for entry in WalkDir::new(&source).min_depth(1).follow_links(true) {
    let entry = entry.map_err(|e| CopyError::Walk {
      path: source.clone(),
      source: e,
    })?;
    let relative = entry.path().strip_prefix(&source).unwrap_or(entry.path());
    let to = options.target_root_folder.join(relative);
    if entry.file_type().is_dir() {
      create_dir(&to)?;
    } else {
      copy_file(entry.path(), &to)?;
    }
  }
  Ok(())
}

fn create_dir(path: &Path) -> Result<(), CopyError> {
  fs::create_dir_all(path).map_err(|source| CopyError::CreateDir {
    path: path.to_path_buf(),
    source,
  })
}

/// Copy a single file, refusing to overwrite and keeping its permissions.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), CopyError> {
  if let Some(parent) = to.parent() {
    create_dir(parent)?;
  }

  let err = |source: io::Error| CopyError::CopyFile {
    from: from.to_path_buf(),
    to: to.to_path_buf(),
    source,
  };

  let mut reader = File::open(from).map_err(err)?;
  let permissions = reader.metadata().map_err(err)?.permissions();
  let mut writer = OpenOptions::new().write(true).create_new(true).open(to).map_err(err)?;
  io::copy(&mut reader, &mut writer).map_err(err)?;
  writer.set_permissions(permissions).map_err(err)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::DeployProjectConfiguration;
  use tempfile::TempDir;

  fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, relative).unwrap();
  }

  struct Fixture {
    _temp: TempDir,
    source: PathBuf,
    target: PathBuf,
  }

  impl Fixture {
    fn new() -> Self {
      let temp = TempDir::new().unwrap();
      let root = dunce::canonicalize(temp.path()).unwrap();
      let source = root.join("repo");
      let target = root.join("out");
      fs::create_dir_all(&source).unwrap();
      fs::create_dir_all(&target).unwrap();
      Self {
        _temp: temp,
        source,
        target,
      }
    }

    fn options(&self, projects: Vec<DeployProjectConfiguration>) -> DeployOptions {
      DeployOptions::new("app", &self.source, &self.target, projects)
    }
  }

  mod copy_file {
    use super::*;

    #[test]
    fn refuses_to_overwrite() {
      let temp = TempDir::new().unwrap();
      touch(temp.path(), "a.txt");
      touch(temp.path(), "b.txt");

      let err = copy_file(&temp.path().join("a.txt"), &temp.path().join("b.txt")).unwrap_err();
      match err {
        CopyError::CopyFile { source, .. } => assert_eq!(source.kind(), io::ErrorKind::AlreadyExists),
        other => panic!("unexpected error: {other}"),
      }
      assert_eq!(fs::read_to_string(temp.path().join("b.txt")).unwrap(), "b.txt");
    }

    #[test]
    fn creates_parent_folders() {
      let temp = TempDir::new().unwrap();
      touch(temp.path(), "a.txt");

      copy_file(&temp.path().join("a.txt"), &temp.path().join("x/y/a.txt")).unwrap();
      assert_eq!(fs::read_to_string(temp.path().join("x/y/a.txt")).unwrap(), "a.txt");
    }

    #[test]
    #[cfg(unix)]
    fn keeps_permissions() {
      use std::os::unix::fs::PermissionsExt;

      let temp = TempDir::new().unwrap();
      touch(temp.path(), "run.sh");
      fs::set_permissions(temp.path().join("run.sh"), fs::Permissions::from_mode(0o755)).unwrap();

      copy_file(&temp.path().join("run.sh"), &temp.path().join("copy.sh")).unwrap();
      let mode = fs::metadata(temp.path().join("copy.sh")).unwrap().permissions().mode();
      assert_eq!(mode & 0o777, 0o755);
    }
  }

  mod deploy_folder {
    use super::*;

    #[test]
    fn tree_mode_skips_node_modules_and_vcs() {
      let f = Fixture::new();
      let lib = f.source.join("node_modules/lib");
      for file in [
        "package.json",
        "index.js",
        "node_modules/nested/index.js",
        "src/node_modules/keep.js",
        ".git/HEAD",
        "src/.DS_Store",
      ] {
        touch(&lib, file);
      }

      deploy_folder(&lib, &f.options(vec![]), &DeployState::new(&[])).unwrap();

      let out = f.target.join("node_modules/lib");
      assert!(out.join("package.json").is_file());
      assert!(out.join("index.js").is_file());
      assert!(out.join("src/node_modules/keep.js").is_file());
      assert!(!out.join("node_modules").exists());
      assert!(!out.join(".git").exists());
      assert!(!out.join("src/.DS_Store").exists());
    }

    #[test]
    fn project_folder_uses_packlist() {
      let f = Fixture::new();
      let app = f.source.join("apps/app");
      for file in ["package.json", "dist/index.js", "src/index.ts"] {
        touch(&app, file);
      }
      fs::write(app.join("package.json"), r#"{ "name": "app", "files": ["dist"] }"#).unwrap();
      let projects = vec![DeployProjectConfiguration::new("app", &app)];
      let state = DeployState::new(&projects);

      deploy_folder(&app, &f.options(projects), &state).unwrap();

      let out = f.target.join("apps/app");
      assert!(out.join("package.json").is_file());
      assert!(out.join("dist/index.js").is_file());
      assert!(!out.join("src").exists());
    }

    #[test]
    fn include_npm_ignore_files_copies_project_whole() {
      let f = Fixture::new();
      let app = f.source.join("apps/app");
      for file in ["package.json", "dist/index.js", "src/index.ts"] {
        touch(&app, file);
      }
      fs::write(app.join("package.json"), r#"{ "name": "app", "files": ["dist"] }"#).unwrap();
      let projects = vec![DeployProjectConfiguration::new("app", &app)];
      let state = DeployState::new(&projects);

      deploy_folder(&app, &f.options(projects).with_npm_ignore_files(true), &state).unwrap();

      assert!(f.target.join("apps/app/src/index.ts").is_file());
    }

    #[test]
    fn folder_outside_source_root_fails() {
      let f = Fixture::new();
      let outside = f.target.parent().unwrap().join("elsewhere");
      touch(&outside, "index.js");

      let err = deploy_folder(&outside, &f.options(vec![]), &DeployState::new(&[])).unwrap_err();
      assert!(matches!(err, CopyError::Scope(_)));
    }

    #[test]
    #[cfg(unix)]
    fn links_are_registered_not_copied() {
      let f = Fixture::new();
      let lib = f.source.join("node_modules/lib");
      touch(&lib, "package.json");
      touch(&f.source, "shared/util.js");
      std::os::unix::fs::symlink("../../shared", lib.join("shared")).unwrap();

      let state = DeployState::new(&[]);
      deploy_folder(&lib, &f.options(vec![]), &state).unwrap();

      assert!(fs::symlink_metadata(f.target.join("node_modules/lib/shared")).is_err());
      let links = state.symlink_analyzer.report_symlinks();
      assert_eq!(links.len(), 1);
      assert_eq!(links[0].link_path, lib.join("shared"));
    }
  }

  mod copy_folders {
    use super::*;

    #[tokio::test]
    async fn copies_every_folder() {
      let f = Fixture::new();
      let mut folders = Vec::new();
      for i in 0..15 {
        let folder = f.source.join(format!("node_modules/p{i}"));
        touch(&folder, "index.js");
        folders.push(folder);
      }

      copy_folders(
        folders,
        Arc::new(f.options(vec![]).with_concurrency(3)),
        Arc::new(DeployState::new(&[])),
      )
      .await
      .unwrap();

      for i in 0..15 {
        assert!(f.target.join(format!("node_modules/p{i}/index.js")).is_file());
      }
    }

    #[tokio::test]
    async fn collision_fails() {
      let f = Fixture::new();
      let folder = f.source.join("node_modules/p");
      touch(&folder, "index.js");
      touch(&f.target, "node_modules/p/index.js");

      let err = copy_folders(
        vec![folder],
        Arc::new(f.options(vec![])),
        Arc::new(DeployState::new(&[])),
      )
      .await
      .unwrap_err();
      assert!(matches!(err, CopyError::CopyFile { .. }));
    }
  }

  mod copy_additional_folder {
    use super::*;

    #[test]
    fn copies_into_target_root() {
      let f = Fixture::new();
      touch(&f.source, "common/deploy-extras/start.sh");
      touch(&f.source, "common/deploy-extras/config/app.json");

      copy_additional_folder(&f.options(vec![]).with_folder_to_copy("common/deploy-extras")).unwrap();

      assert!(f.target.join("start.sh").is_file());
      assert!(f.target.join("config/app.json").is_file());
    }

    #[test]
    fn collision_fails() {
      let f = Fixture::new();
      touch(&f.source, "extras/package.json");
      touch(&f.target, "package.json");

      let err = copy_additional_folder(&f.options(vec![]).with_folder_to_copy("extras")).unwrap_err();
      assert!(matches!(err, CopyError::CopyFile { .. }));
    }

    #[test]
    fn nothing_configured_is_a_no_op() {
      let f = Fixture::new();
      copy_additional_folder(&f.options(vec![])).unwrap();
      assert_eq!(fs::read_dir(&f.target).unwrap().count(), 0);
    }
  }
}
