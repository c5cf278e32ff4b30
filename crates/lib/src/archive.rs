//! Zipping a finished deployment.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::DeployOptions;
use crate::paths::to_slash;

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("failed to walk '{path}': {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("archive I/O failed for '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write archive entry '{path}': {source}")]
  Zip {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },
}

/// Zip the target folder to the configured archive path.
///
/// A relative archive path is resolved against the target folder. The archive
/// never contains itself. Returns the archive path, or `None` when no archive
/// was requested.
pub fn create_archive(options: &DeployOptions) -> Result<Option<PathBuf>, ArchiveError> {
  let Some(archive_path) = &options.create_archive_file_path else {
    return Ok(None);
  };
  let target_root = &options.target_root_folder;
  let archive_path = if archive_path.is_absolute() {
    archive_path.clone()
  } else {
    target_root.join(archive_path)
  };

  info!(path = %archive_path.display(), "Creating archive");
  if let Some(parent) = archive_path.parent() {
    fs::create_dir_all(parent).map_err(io_error(parent))?;
  }
  let file = File::create(&archive_path).map_err(io_error(&archive_path))?;
  let mut zip = ZipWriter::new(file);
  let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

  let mut entries = 0usize;
  for entry in WalkDir::new(target_root).min_depth(1).follow_links(false).sort_by_file_name() {
    let entry = entry.map_err(|source| ArchiveError::Walk {
      path: target_root.clone(),
      source,
    })?;
    let path = entry.path();
    if path == archive_path {
      continue;
    }

    let name = to_slash(path.strip_prefix(target_root).unwrap_or(path));
    let metadata = entry.metadata().map_err(|source| ArchiveError::Walk {
      path: path.to_path_buf(),
      source,
    })?;
    let options = with_permissions(base, &metadata);
    let zip_err = |source| ArchiveError::Zip {
      path: path.to_path_buf(),
      source,
    };

    if entry.path_is_symlink() {
      let link_target = fs::read_link(path).map_err(io_error(path))?;
      zip
        .add_symlink(name, link_target.to_string_lossy().replace('\\', "/"), options)
        .map_err(zip_err)?;
    } else if entry.file_type().is_dir() {
      zip.add_directory(name, options).map_err(zip_err)?;
    } else {
      zip.start_file(name, options).map_err(zip_err)?;
      let mut reader = File::open(path).map_err(io_error(path))?;
      io::copy(&mut reader, &mut zip).map_err(io_error(path))?;
    }
    entries += 1;
  }

  zip.finish().map_err(|source| ArchiveError::Zip {
    path: archive_path.clone(),
    source,
  })?;
  debug!(path = %archive_path.display(), entries, "archive written");
  Ok(Some(archive_path))
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError {
  let path = path.to_path_buf();
  move |source| ArchiveError::Io { path, source }
}

#[cfg(unix)]
fn with_permissions(options: SimpleFileOptions, metadata: &fs::Metadata) -> SimpleFileOptions {
  use std::os::unix::fs::PermissionsExt;
  options.unix_permissions(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn with_permissions(options: SimpleFileOptions, _metadata: &fs::Metadata) -> SimpleFileOptions {
  options
}
