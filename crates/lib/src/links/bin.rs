//! `node_modules/.bin` shims for deployed projects.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::LinkError;
use crate::consts::PACKAGE_JSON_FILENAME;
use crate::package_json::PackageJson;
use crate::paths::normalized;

/// Creates command shims for the packages installed in a `node_modules` folder.
pub trait BinLinker: Send + Sync {
  /// Link every `bin` entry of the packages in `node_modules_folder` into
  /// `bin_folder`. Returns the number of shims created.
  fn link_bins(&self, node_modules_folder: &Path, bin_folder: &Path) -> Result<usize, LinkError>;
}

/// npm-style bin linking.
///
/// Unix gets relative symlinks with the script marked executable. Windows
/// gets `.cmd` shims. Existing entries are left untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeBinLinker;

impl BinLinker for NodeBinLinker {
  fn link_bins(&self, node_modules_folder: &Path, bin_folder: &Path) -> Result<usize, LinkError> {
    let mut created = 0;
    for package_folder in installed_packages(node_modules_folder)? {
      let manifest = package_folder.join(PACKAGE_JSON_FILENAME);
      if !manifest.is_file() {
        continue;
      }
      let package_json = PackageJson::load_file(&manifest)?;

      for (command, script) in package_json.bin_entries() {
        if !is_safe_command(&command) {
          debug!(command = %command, package = %package_folder.display(), "skipping unsafe bin name");
          continue;
        }
        let script_path = normalized(&package_folder.join(&script));
        if !script_path.starts_with(normalized(&package_folder)) {
          debug!(command = %command, script = %script, package = %package_folder.display(), "skipping bin outside its package");
          continue;
        }
        if write_shim(bin_folder, &command, &script_path)? {
          created += 1;
        }
      }
    }
    Ok(created)
  }
}

/// Package folders directly in `node_modules`, including `@scope/*`.
fn installed_packages(node_modules_folder: &Path) -> Result<Vec<PathBuf>, LinkError> {
  let mut packages = Vec::new();
  for entry in read_dir_sorted(node_modules_folder)? {
    let Some(name) = entry.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
      continue;
    };
    if name.starts_with('.') {
      continue;
    }
    if name.starts_with('@') {
      packages.extend(read_dir_sorted(&entry)?);
    } else {
      packages.push(entry);
    }
  }
  Ok(packages)
}

fn read_dir_sorted(folder: &Path) -> Result<Vec<PathBuf>, LinkError> {
  let entries = match fs::read_dir(folder) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(source) => {
      return Err(LinkError::Bin {
        path: folder.to_path_buf(),
        source,
      });
    }
  };
  let mut paths = entries
    .map(|e| e.map(|e| e.path()))
    .collect::<io::Result<Vec<_>>>()
    .map_err(|source| LinkError::Bin {
      path: folder.to_path_buf(),
      source,
    })?;
  paths.sort();
  Ok(paths)
}

fn is_safe_command(command: &str) -> bool {
  !command.is_empty() && !command.contains(['/', '\\']) && command != "." && command != ".."
}

fn bin_error(path: &Path) -> impl FnOnce(io::Error) -> LinkError {
  let path = path.to_path_buf();
  move |source| LinkError::Bin { path, source }
}

/// Returns `false` when an entry for `command` already exists.
fn write_shim(bin_folder: &Path, command: &str, script_path: &Path) -> Result<bool, LinkError> {
  fs::create_dir_all(bin_folder).map_err(bin_error(bin_folder))?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;

    let shim = bin_folder.join(command);
    if fs::symlink_metadata(&shim).is_ok() {
      return Ok(false);
    }
    if let Ok(metadata) = fs::metadata(script_path) {
      let mut permissions = metadata.permissions();
      permissions.set_mode(permissions.mode() | 0o111);
      fs::set_permissions(script_path, permissions).map_err(bin_error(script_path))?;
    }
    let offset = crate::paths::relative_path(bin_folder, script_path);
    std::os::unix::fs::symlink(&offset, &shim).map_err(bin_error(&shim))?;
    trace!(shim = %shim.display(), target = %offset.display(), "linked bin");
  }

  #[cfg(windows)]
  {
    let shim = bin_folder.join(format!("{command}.cmd"));
    if fs::symlink_metadata(&shim).is_ok() {
      return Ok(false);
    }
    let offset = crate::paths::relative_path(bin_folder, script_path);
    let content = format!("@IF EXIST \"%~dp0\\node.exe\" (\r\n  \"%~dp0\\node.exe\" \"%~dp0\\{0}\" %*\r\n) ELSE (\r\n  node \"%~dp0\\{0}\" %*\r\n)\r\n", offset.display());
    fs::write(&shim, content).map_err(bin_error(&shim))?;
    trace!(shim = %shim.display(), "wrote bin shim");
  }

  Ok(true)
}
