//! The file list `npm pack` would publish for a package folder.
//!
//! With a `files` field only matching entries (plus a handful of files npm
//! always ships) are listed. Without one, everything is listed minus the
//! patterns in `.npmignore`, or `.gitignore` when there is no `.npmignore`.
//! Patterns use gitignore semantics.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use thiserror::Error;
use tracing::trace;
use walkdir::WalkDir;

use crate::package_json::PackageJson;
use crate::paths::normalized;

/// Never published, wherever they appear.
const ALWAYS_EXCLUDED: &[&str] = &[
  "/node_modules",
  ".git",
  ".svn",
  ".hg",
  "CVS",
  ".DS_Store",
  "._*",
  "*.orig",
  ".npmrc",
  ".npmignore",
  ".gitignore",
  "npm-debug.log",
  "package-lock.json",
  ".*.swp",
];

/// Root-level file name prefixes published even when `files` omits them.
const ALWAYS_INCLUDED_PREFIXES: &[&str] = &["readme", "license", "licence", "changelog", "notice"];

#[derive(Debug, Error)]
pub enum PacklistError {
  #[error("failed to walk '{path}': {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid pattern '{pattern}' in '{folder}': {source}")]
  Pattern {
    folder: PathBuf,
    pattern: String,
    #[source]
    source: ignore::Error,
  },
}

/// How entries outside the default exclusions are selected.
enum Selection {
  /// `files` allow-list.
  AllowList(Gitignore),
  /// `.npmignore` / `.gitignore` deny-list.
  DenyList(Gitignore),
}

impl Selection {
  fn excludes_dir(&self, relative: &Path) -> bool {
    match self {
      // Allow-list entries may name files deep inside any folder.
      Selection::AllowList(_) => false,
      Selection::DenyList(deny) => deny.matched(relative, true).is_ignore(),
    }
  }

  fn includes_file(&self, relative: &Path) -> bool {
    match self {
      Selection::AllowList(allow) => allow.matched_path_or_any_parents(relative, false).is_ignore(),
      Selection::DenyList(deny) => !deny.matched_path_or_any_parents(relative, false).is_ignore(),
    }
  }
}

/// Files (and links) in `folder` that `npm pack` would publish.
///
/// Paths are relative to `folder`, normalized, deduplicated and sorted.
pub fn package_files(folder: &Path, package_json: &PackageJson) -> Result<Vec<PathBuf>, PacklistError> {
  let defaults = build_matcher(folder, ALWAYS_EXCLUDED.iter().copied())?;
  let selection = match &package_json.files {
    Some(files) => Selection::AllowList(build_matcher(folder, files.iter().map(String::as_str))?),
    None => Selection::DenyList(load_ignore_file(folder)?),
  };
  let main = package_json.main.as_deref().map(|m| normalized(Path::new(m)));

  let mut listed = BTreeSet::new();
  let walker = WalkDir::new(folder)
    .min_depth(1)
    .follow_links(false)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| {
      if !entry.file_type().is_dir() {
        return true;
      }
      let relative = entry.path().strip_prefix(folder).unwrap_or(entry.path());
      !defaults.matched(relative, true).is_ignore() && !selection.excludes_dir(relative)
    });

  for entry in walker {
    let entry = entry.map_err(|source| PacklistError::Walk {
      path: folder.to_path_buf(),
      source,
    })?;
    if entry.file_type().is_dir() {
      continue;
    }

    let relative = normalized(entry.path().strip_prefix(folder).unwrap_or(entry.path()));
    if defaults.matched_path_or_any_parents(&relative, false).is_ignore() {
      continue;
    }

    let always = entry.depth() == 1 && is_always_included(&relative);
    let is_main = main.as_deref() == Some(relative.as_path());
    if always || is_main || selection.includes_file(&relative) {
      listed.insert(relative);
    }
  }

  trace!(folder = %folder.display(), files = listed.len(), "computed packlist");
  Ok(listed.into_iter().collect())
}

fn is_always_included(relative: &Path) -> bool {
  let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
    return false;
  };
  let lower = name.to_ascii_lowercase();
  lower == "package.json" || ALWAYS_INCLUDED_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn build_matcher<'a>(folder: &Path, patterns: impl IntoIterator<Item = &'a str>) -> Result<Gitignore, PacklistError> {
  let mut builder = GitignoreBuilder::new(folder);
  for pattern in patterns {
    builder
      .add_line(None, pattern)
      .map_err(|source| PacklistError::Pattern {
        folder: folder.to_path_buf(),
        pattern: pattern.to_string(),
        source,
      })?;
  }
  builder.build().map_err(|source| PacklistError::Pattern {
    folder: folder.to_path_buf(),
    pattern: String::new(),
    source,
  })
}

/// Patterns from `.npmignore`, falling back to `.gitignore`.
fn load_ignore_file(folder: &Path) -> Result<Gitignore, PacklistError> {
  for name in [".npmignore", ".gitignore"] {
    let path = folder.join(name);
    match fs::read_to_string(&path) {
      Ok(content) => return build_matcher(folder, content.lines()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
      Err(source) => return Err(PacklistError::Read { path, source }),
    }
  }
  Ok(Gitignore::empty())
}
