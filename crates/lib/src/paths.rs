//! Path remapping between the source tree and the deployment.
//!
//! Two remaps exist and must not be mixed up:
//! - [`remap_for_deploy_folder`]: source-absolute to target-absolute, used when
//!   copying files and creating links.
//! - [`remap_for_deploy_metadata`]: source-absolute to a forward-slash path
//!   relative to the root, used in `deploy-metadata.json`.
//!
//! Both fail with [`PathScopeError`] for paths outside the source root.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// A path expected to be under the source root is not.
///
/// This is an internal bookkeeping bug, never an environment condition.
#[derive(Debug, Error)]
#[error("source path '{path}' is not under '{root}'")]
pub struct PathScopeError {
  pub path: PathBuf,
  pub root: PathBuf,
}

/// The part of `path` below `root`, or a [`PathScopeError`].
pub fn relative_to_root<'a>(path: &'a Path, root: &Path) -> Result<&'a Path, PathScopeError> {
  path.strip_prefix(root).map_err(|_| PathScopeError {
    path: path.to_path_buf(),
    root: root.to_path_buf(),
  })
}

/// Map an absolute path in the source tree to the same place in the target tree.
///
/// ```text
/// /repo/libraries/my-lib  ->  /repo/common/deploy/libraries/my-lib
/// ```
pub fn remap_for_deploy_folder(path: &Path, source_root: &Path, target_root: &Path) -> Result<PathBuf, PathScopeError> {
  let relative = relative_to_root(path, source_root)?;
  if relative.as_os_str().is_empty() {
    return Ok(target_root.to_path_buf());
  }
  Ok(target_root.join(relative))
}

/// Map an absolute path in the source tree to a root-relative, forward-slash path.
///
/// ```text
/// /repo/libraries/my-lib  ->  libraries/my-lib
/// ```
pub fn remap_for_deploy_metadata(path: &Path, source_root: &Path) -> Result<String, PathScopeError> {
  let relative = relative_to_root(path, source_root)?;
  Ok(to_slash(relative))
}

/// Join path components with `/` regardless of the host separator.
pub fn to_slash(path: &Path) -> String {
  path
    .components()
    .filter_map(|c| match c {
      Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
      Component::ParentDir => Some("..".to_string()),
      _ => None,
    })
    .collect::<Vec<_>>()
    .join("/")
}

/// Compute the relative path leading from folder `from_dir` to `to`.
///
/// Both paths must be absolute. Returns `.` when they are equal.
pub fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
  let from: Vec<Component<'_>> = normalize(from_dir);
  let to: Vec<Component<'_>> = normalize(to);

  let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

  let mut result = PathBuf::new();
  for _ in common..from.len() {
    result.push("..");
  }
  for component in &to[common..] {
    result.push(component.as_os_str());
  }

  if result.as_os_str().is_empty() {
    PathBuf::from(".")
  } else {
    result
  }
}

/// Lexically normalize a path by dropping `.` and folding `..`.
pub fn normalize(path: &Path) -> Vec<Component<'_>> {
  let mut out: Vec<Component<'_>> = Vec::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => match out.last() {
        Some(Component::Normal(_)) => {
          out.pop();
        }
        Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
        _ => out.push(component),
      },
      other => out.push(other),
    }
  }
  out
}

/// [`normalize`] collected back into a path.
pub fn normalized(path: &Path) -> PathBuf {
  normalize(path).iter().map(|c| c.as_os_str()).collect()
}
