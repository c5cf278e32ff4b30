//! `nodeploy links create|remove`: apply or undo the links recorded in a
//! deployment's `deploy-metadata.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use nodeploy_lib::links::{create_links, platform_link_creator, remove_links};

use crate::output::print_success;

pub fn cmd_links_create(target: &Path) -> Result<()> {
  let target = &deployment_folder(target)?;
  let creator = platform_link_creator();
  let created = create_links(target, creator.as_ref())
    .with_context(|| format!("Failed to create links in {}", target.display()))?;
  print_success(&format!("Created {} link(s)", created));
  Ok(())
}

pub fn cmd_links_remove(target: &Path) -> Result<()> {
  let target = &deployment_folder(target)?;
  let removed =
    remove_links(target).with_context(|| format!("Failed to remove links in {}", target.display()))?;
  print_success(&format!("Removed {} link(s)", removed));
  Ok(())
}

fn deployment_folder(target: &Path) -> Result<PathBuf> {
  dunce::canonicalize(target).with_context(|| format!("Deployment folder not found: {}", target.display()))
}
