//! Dependency closure crawl.
//!
//! Starting from the folders of the included projects, follows every runtime
//! dependency to the real folder it resolves to and schedules that folder for
//! copy. Folders are analyzed on a bounded pool: each finished analysis feeds
//! the folders it discovered back into the same queue, and a folder already
//! scheduled is skipped, which is what makes cycles and diamonds terminate.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, trace, warn};

use crate::config::DeployOptions;
use crate::consts::{NODE_MODULES_DIR, PNPM_VIRTUAL_STORE_DIR};
use crate::filter::apply_filters;
use crate::package_json::{PackageJson, PackageJsonError};
use crate::resolve::{DependencyResolver, ResolveError};
use crate::state::DeployState;

/// Errors that abort the crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
  /// The folder could not be resolved to its real path.
  #[error("failed to resolve real path of '{path}': {source}")]
  RealPath {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The folder's manifest could not be loaded.
  #[error(transparent)]
  PackageJson(#[from] PackageJsonError),

  /// A required dependency could not be resolved.
  #[error("failed to resolve a dependency of '{folder}': {source}")]
  Resolve {
    folder: PathBuf,
    #[source]
    source: ResolveError,
  },

  /// A folder analysis task panicked or was cancelled.
  #[error("folder analysis task failed: {0}")]
  Task(#[from] JoinError),
}

impl CrawlError {
  /// The resolution failure behind this error, if any.
  pub fn resolve_error(&self) -> Option<&ResolveError> {
    match self {
      CrawlError::Resolve { source, .. } => Some(source),
      _ => None,
    }
  }
}

/// Crawl the closure of `start_folders` into `state`.
///
/// At most `options.concurrency` folder analyses are in flight. The first
/// failure stops scheduling new work and is returned.
pub async fn collect_folders(
  start_folders: Vec<PathBuf>,
  options: Arc<DeployOptions>,
  state: Arc<DeployState>,
  resolver: Arc<dyn DependencyResolver>,
) -> Result<(), CrawlError> {
  let concurrency = options.concurrency.max(1);
  let mut queue: VecDeque<PathBuf> = start_folders.into();
  let mut in_flight = JoinSet::new();

  loop {
    while in_flight.len() < concurrency {
      let Some(folder) = queue.pop_front() else {
        break;
      };
      let options = options.clone();
      let state = state.clone();
      let resolver = resolver.clone();
      in_flight.spawn_blocking(move || analyze_folder(&folder, &options, &state, resolver.as_ref()));
    }

    let Some(joined) = in_flight.join_next().await else {
      break;
    };

    match joined {
      Ok(Ok(discovered)) => queue.extend(discovered),
      Ok(Err(e)) => {
        in_flight.abort_all();
        return Err(e);
      }
      Err(e) => {
        in_flight.abort_all();
        return Err(CrawlError::Task(e));
      }
    }
  }

  Ok(())
}

/// Analyze one folder and return the dependency folders it leads to.
///
/// Returns nothing when the folder's real path was already scheduled.
pub fn analyze_folder(
  folder: &Path,
  options: &DeployOptions,
  state: &DeployState,
  resolver: &dyn DependencyResolver,
) -> Result<Vec<PathBuf>, CrawlError> {
  let real_folder = dunce::canonicalize(folder).map_err(|source| CrawlError::RealPath {
    path: folder.to_path_buf(),
    source,
  })?;

  if !state.try_schedule_folder(&real_folder) {
    trace!(folder = %real_folder.display(), "already scheduled");
    return Ok(Vec::new());
  }
  debug!(folder = %real_folder.display(), "scheduled folder");

  let package_json = options.transform(PackageJson::load(&real_folder)?);
  let (mut names, optional) = dependency_candidates(&package_json, options.include_dev_dependencies);

  if let Some(project) = state.project_by_folder(&real_folder) {
    apply_filters(
      &mut names,
      &project.additional_dependencies_to_include,
      &project.dependencies_to_exclude,
    );
  }

  let mut discovered = Vec::with_capacity(names.len());
  for name in &names {
    match resolver.resolve_dependency_folder(name, &real_folder, &state.symlink_analyzer) {
      Ok(dependency_folder) => discovered.push(dependency_folder),
      Err(e) if e.is_not_found() && optional.contains(name.as_str()) => {
        debug!(dependency = %name, folder = %real_folder.display(), "skipping missing optional dependency");
      }
      Err(source) => {
        return Err(CrawlError::Resolve {
          folder: real_folder,
          source,
        });
      }
    }
  }

  if let Some(workaround) = resolve_workaround_link(&real_folder, &package_json, options, state, resolver)? {
    discovered.push(workaround);
  }

  Ok(discovered)
}

/// Candidate dependency names and the subset whose absence is tolerated.
///
/// Peers count as optional because they are so frequently broken in practice.
fn dependency_candidates(package_json: &PackageJson, include_dev: bool) -> (BTreeSet<String>, HashSet<String>) {
  let mut names: BTreeSet<String> = package_json.dependency_names().map(str::to_string).collect();
  if include_dev {
    names.extend(package_json.dev_dependency_names().map(str::to_string));
  }

  let mut optional = HashSet::new();
  for name in package_json
    .peer_dependency_names()
    .chain(package_json.optional_dependency_names())
  {
    names.insert(name.to_string());
    optional.insert(name.to_string());
  }
  (names, optional)
}

/// Re-resolve a package installed by pnpm from its workaround-link folder.
///
/// Best effort: a missing workaround link is only logged.
fn resolve_workaround_link(
  real_folder: &Path,
  package_json: &PackageJson,
  options: &DeployOptions,
  state: &DeployState,
  resolver: &dyn DependencyResolver,
) -> Result<Option<PathBuf>, CrawlError> {
  let Some(install_folder) = &options.pnpm_install_folder else {
    return Ok(None);
  };
  if real_folder == install_folder || !real_folder.starts_with(install_folder) {
    return Ok(None);
  }
  let Some(name) = package_json.name.as_deref() else {
    return Ok(None);
  };

  let workaround_folder = install_folder.join(NODE_MODULES_DIR).join(PNPM_VIRTUAL_STORE_DIR);
  match resolver.resolve_dependency_folder(name, &workaround_folder, &state.symlink_analyzer) {
    Ok(folder) => Ok(Some(folder)),
    Err(e) if e.is_not_found() => {
      warn!(folder = %real_folder.display(), "Ignoring missing PNPM workaround link");
      Ok(None)
    }
    Err(source) => Err(CrawlError::Resolve {
      folder: real_folder.to_path_buf(),
      source,
    }),
  }
}
