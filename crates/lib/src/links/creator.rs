//! Platform link creation.
//!
//! - **Unix**: relative symbolic links for both files and folders.
//! - **Windows**: junctions for folders and hard links for files, neither of
//!   which needs elevated privileges.

use std::io;
use std::path::Path;

/// Creates links of each [`LinkKind`](crate::symlink::LinkKind).
///
/// Both paths are absolute. The target must already exist.
pub trait LinkCreator: Send + Sync {
  fn create_file_link(&self, link_path: &Path, target_path: &Path) -> io::Result<()>;
  fn create_folder_link(&self, link_path: &Path, target_path: &Path) -> io::Result<()>;
}

/// Relative symbolic links.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkCreator;

#[cfg(unix)]
impl SymlinkCreator {
  fn create(link_path: &Path, target_path: &Path) -> io::Result<()> {
    let link_folder = link_path.parent().unwrap_or(Path::new("/"));
    let offset = crate::paths::relative_path(link_folder, target_path);
    std::os::unix::fs::symlink(offset, link_path)
  }
}

#[cfg(unix)]
impl LinkCreator for SymlinkCreator {
  fn create_file_link(&self, link_path: &Path, target_path: &Path) -> io::Result<()> {
    Self::create(link_path, target_path)
  }

  fn create_folder_link(&self, link_path: &Path, target_path: &Path) -> io::Result<()> {
    Self::create(link_path, target_path)
  }
}

/// Junctions and hard links.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct JunctionCreator;

#[cfg(windows)]
impl LinkCreator for JunctionCreator {
  fn create_file_link(&self, link_path: &Path, target_path: &Path) -> io::Result<()> {
    std::fs::hard_link(target_path, link_path)
  }

  fn create_folder_link(&self, link_path: &Path, target_path: &Path) -> io::Result<()> {
    junction::create(target_path, link_path)
  }
}

/// The link creator for the host platform.
pub fn platform_link_creator() -> Box<dyn LinkCreator> {
  #[cfg(unix)]
  {
    Box::new(SymlinkCreator)
  }
  #[cfg(windows)]
  {
    Box::new(JunctionCreator)
  }
}
