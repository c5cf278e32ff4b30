//! Dependency folder resolution.
//!
//! Finds the folder a runtime `require("<name>")` would load a package from,
//! which after hoisting is usually not where the declared semver range
//! suggests. Every link crossed on the way is registered with the
//! [`SymlinkAnalyzer`] so it can be recreated in the deployment.
//!
//! # Lookup order
//!
//! 1. Self-reference: the nearest enclosing `package.json` declares the name.
//! 2. `node_modules/<name>` in the starting folder and each ancestor, skipping
//!    folders that are themselves `node_modules`.
//!
//! Dependency names are always looked up as packages. A dependency named
//! like a Node built-in (`events`, `buffer`, ...) resolves to the installed
//! package, never to the built-in.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::trace;

use crate::consts::{NODE_MODULES_DIR, PACKAGE_JSON_FILENAME};
use crate::package_json::{PackageJson, PackageJsonError};
use crate::symlink::{SymlinkAnalyzer, SymlinkError};

/// Node built-in module names that a published package may shadow.
const NODE_BUILTIN_MODULES: &[&str] = &[
  "assert",
  "buffer",
  "child_process",
  "constants",
  "crypto",
  "domain",
  "events",
  "fs",
  "http",
  "https",
  "module",
  "os",
  "path",
  "process",
  "punycode",
  "querystring",
  "readline",
  "stream",
  "string_decoder",
  "timers",
  "tty",
  "url",
  "util",
  "vm",
  "zlib",
];

/// Errors that can occur while resolving a dependency.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// No installed copy of the package is reachable from the search root.
  #[error("cannot find module '{package_name}' from '{search_root}'")]
  DependencyNotFound { package_name: String, search_root: PathBuf },

  /// The dependency name cannot be a package name.
  #[error("invalid package name '{0}'")]
  InvalidPackageName(String),

  /// A manifest on the lookup path could not be read.
  #[error(transparent)]
  PackageJson(#[from] PackageJsonError),

  /// A link on the lookup path could not be followed.
  #[error(transparent)]
  Symlink(#[from] SymlinkError),
}

impl ResolveError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, ResolveError::DependencyNotFound { .. })
  }
}

/// Resolves a package name to the real folder containing its `package.json`.
pub trait DependencyResolver: Send + Sync {
  fn resolve_dependency_folder(
    &self,
    package_name: &str,
    starting_folder: &Path,
    analyzer: &SymlinkAnalyzer,
  ) -> Result<PathBuf, ResolveError>;
}

/// Node's `node_modules` lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeModulesResolver;

impl NodeModulesResolver {
  pub fn new() -> Self {
    Self
  }

  /// A package importing its own name. Node only allows this when the
  /// enclosing manifest declares `exports`.
  fn self_reference(&self, package_name: &str, starting_folder: &Path) -> Result<Option<PathBuf>, ResolveError> {
    let Some(folder) = find_package_folder(starting_folder) else {
      return Ok(None);
    };
    let package_json = PackageJson::load(&folder)?;
    if package_json.name.as_deref() == Some(package_name) && package_json.extra.contains_key("exports") {
      return Ok(Some(folder));
    }
    Ok(None)
  }
}

impl DependencyResolver for NodeModulesResolver {
  fn resolve_dependency_folder(
    &self,
    package_name: &str,
    starting_folder: &Path,
    analyzer: &SymlinkAnalyzer,
  ) -> Result<PathBuf, ResolveError> {
    validate_package_name(package_name)?;

    if is_builtin_module(package_name) {
      trace!(package = package_name, "dependency shadows a node built-in");
    }

    if let Some(folder) = self.self_reference(package_name, starting_folder)? {
      let node = analyzer.analyze_path(&folder)?;
      trace!(package = package_name, folder = %node.real_path.display(), "resolved self-reference");
      return Ok(node.real_path);
    }

    for ancestor in starting_folder.ancestors() {
      if ancestor.file_name().is_some_and(|name| name == NODE_MODULES_DIR) {
        continue;
      }
      let candidate = ancestor.join(NODE_MODULES_DIR).join(package_name);
      if !candidate.join(PACKAGE_JSON_FILENAME).is_file() {
        continue;
      }

      let node = analyzer.analyze_path(&candidate)?;
      trace!(
        package = package_name,
        from = %starting_folder.display(),
        folder = %node.real_path.display(),
        "resolved dependency"
      );
      return Ok(node.real_path);
    }

    Err(ResolveError::DependencyNotFound {
      package_name: package_name.to_string(),
      search_root: starting_folder.to_path_buf(),
    })
  }
}

/// Whether `name` is a Node built-in module.
pub fn is_builtin_module(name: &str) -> bool {
  let name = name.strip_prefix("node:").unwrap_or(name);
  NODE_BUILTIN_MODULES.contains(&name)
}

/// The nearest folder at or above `folder` that contains a `package.json`.
pub fn find_package_folder(folder: &Path) -> Option<PathBuf> {
  folder
    .ancestors()
    .find(|dir| dir.join(PACKAGE_JSON_FILENAME).is_file())
    .map(Path::to_path_buf)
}

/// Reject names that could escape `node_modules`.
fn validate_package_name(name: &str) -> Result<(), ResolveError> {
  let invalid = || ResolveError::InvalidPackageName(name.to_string());

  if name.is_empty() || name.contains('\\') || name.starts_with('.') || name.starts_with('/') {
    return Err(invalid());
  }

  let segments: Vec<&str> = name.split('/').collect();
  let expected = if name.starts_with('@') { 2 } else { 1 };
  if segments.len() != expected || segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
    return Err(invalid());
  }
  Ok(())
}
