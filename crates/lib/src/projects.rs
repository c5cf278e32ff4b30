//! Expansion of `additionalProjectsToInclude`.

use std::collections::HashSet;

use tracing::debug;

use crate::config::{ConfigError, DeployProjectConfiguration};
use crate::state::DeployState;

/// Every project reachable from the main project through
/// `additional_projects_to_include`, depth-first with the main project first.
///
/// A project already collected is not expanded again, so cyclic include
/// declarations terminate.
pub fn collect_projects_to_include<'a>(
  main_project_name: &str,
  state: &'a DeployState,
) -> Result<Vec<&'a DeployProjectConfiguration>, ConfigError> {
  let main = state
    .project_by_name(main_project_name)
    .ok_or_else(|| ConfigError::MainProjectNotFound(main_project_name.to_string()))?;

  let mut seen = HashSet::new();
  let mut included = Vec::new();
  collect(main, state, &mut seen, &mut included)?;
  Ok(included)
}

fn collect<'a>(
  project: &'a DeployProjectConfiguration,
  state: &'a DeployState,
  seen: &mut HashSet<&'a str>,
  included: &mut Vec<&'a DeployProjectConfiguration>,
) -> Result<(), ConfigError> {
  if !seen.insert(project.project_name.as_str()) {
    return Ok(());
  }
  debug!(project = %project.project_name, "including project");
  included.push(project);

  for name in &project.additional_projects_to_include {
    let additional = state
      .project_by_name(name)
      .ok_or_else(|| ConfigError::ProjectNotFound {
        name: name.clone(),
        included_by: project.project_name.clone(),
      })?;
    collect(additional, state, seen, included)?;
  }
  Ok(())
}
