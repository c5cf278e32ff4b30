//! Package manifest (`package.json`) model.
//!
//! Only the fields the deployment engine inspects are typed. Everything else
//! is kept in [`PackageJson::extra`] so a manifest transform can rewrite the
//! document without losing fields.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::PACKAGE_JSON_FILENAME;

/// Errors that can occur while loading a package manifest.
#[derive(Debug, Error)]
pub enum PackageJsonError {
  /// Failed to read the manifest file.
  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The manifest is not valid JSON or has unexpected field types.
  #[error("failed to parse '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// The `bin` field: either a single script or a map of command names to scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinField {
  Single(String),
  Map(BTreeMap<String, String>),
}

/// A parsed `package.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub main: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bin: Option<BinField>,

  /// Allow-list of files published by `npm pack`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub files: Option<Vec<String>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dependencies: Option<BTreeMap<String, String>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dev_dependencies: Option<BTreeMap<String, String>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub peer_dependencies: Option<BTreeMap<String, String>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub optional_dependencies: Option<BTreeMap<String, String>>,

  /// Every field not modelled above.
  #[serde(flatten)]
  pub extra: BTreeMap<String, serde_json::Value>,
}

impl PackageJson {
  /// Load `<folder>/package.json`.
  pub fn load(folder: &Path) -> Result<Self, PackageJsonError> {
    let path = folder.join(PACKAGE_JSON_FILENAME);
    Self::load_file(&path)
  }

  /// Load a manifest from an explicit file path.
  pub fn load_file(path: &Path) -> Result<Self, PackageJsonError> {
    let content = fs::read_to_string(path).map_err(|source| PackageJsonError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| PackageJsonError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Names declared under `dependencies`.
  pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
    keys(&self.dependencies)
  }

  /// Names declared under `devDependencies`.
  pub fn dev_dependency_names(&self) -> impl Iterator<Item = &str> {
    keys(&self.dev_dependencies)
  }

  /// Names declared under `peerDependencies`.
  pub fn peer_dependency_names(&self) -> impl Iterator<Item = &str> {
    keys(&self.peer_dependencies)
  }

  /// Names declared under `optionalDependencies`.
  pub fn optional_dependency_names(&self) -> impl Iterator<Item = &str> {
    keys(&self.optional_dependencies)
  }

  /// Command name and script path for every `bin` entry.
  ///
  /// A single-script `bin` is published under the unscoped package name.
  pub fn bin_entries(&self) -> Vec<(String, String)> {
    match &self.bin {
      None => Vec::new(),
      Some(BinField::Map(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
      Some(BinField::Single(script)) => match self.name.as_deref() {
        Some(name) => {
          let command = name.rsplit('/').next().unwrap_or(name);
          vec![(command.to_string(), script.clone())]
        }
        None => Vec::new(),
      },
    }
  }
}

fn keys(map: &Option<BTreeMap<String, String>>) -> impl Iterator<Item = &str> {
  map.iter().flat_map(|m| m.keys().map(String::as_str))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn parses_dependency_sections() {
    let json = r#"{
      "name": "app",
      "version": "1.0.0",
      "dependencies": { "lib-a": "workspace:*" },
      "devDependencies": { "jest": "^29.0.0" },
      "peerDependencies": { "react": "*" },
      "optionalDependencies": { "fsevents": "^2.0.0" }
    }"#;
    let pkg: PackageJson = serde_json::from_str(json).unwrap();

    assert_eq!(pkg.name.as_deref(), Some("app"));
    assert_eq!(pkg.dependency_names().collect::<Vec<_>>(), vec!["lib-a"]);
    assert_eq!(pkg.dev_dependency_names().collect::<Vec<_>>(), vec!["jest"]);
    assert_eq!(pkg.peer_dependency_names().collect::<Vec<_>>(), vec!["react"]);
    assert_eq!(pkg.optional_dependency_names().collect::<Vec<_>>(), vec!["fsevents"]);
  }

  #[test]
  fn keeps_unmodelled_fields() {
    let json = r#"{ "name": "x", "scripts": { "build": "tsc" }, "license": "MIT" }"#;
    let pkg: PackageJson = serde_json::from_str(json).unwrap();

    assert!(pkg.extra.contains_key("scripts"));
    let back = serde_json::to_value(&pkg).unwrap();
    assert_eq!(back["license"], "MIT");
    assert_eq!(back["scripts"]["build"], "tsc");
  }

  #[test]
  fn single_bin_uses_unscoped_name() {
    let json = r#"{ "name": "@scope/tool", "bin": "./cli.js" }"#;
    let pkg: PackageJson = serde_json::from_str(json).unwrap();

    assert_eq!(pkg.bin_entries(), vec![("tool".to_string(), "./cli.js".to_string())]);
  }

  #[test]
  fn map_bin_keeps_command_names() {
    let json = r#"{ "name": "tool", "bin": { "a": "a.js", "b": "b.js" } }"#;
    let pkg: PackageJson = serde_json::from_str(json).unwrap();

    assert_eq!(pkg.bin_entries().len(), 2);
  }

  #[test]
  fn load_reports_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = PackageJson::load(temp.path()).unwrap_err();
    assert!(matches!(err, PackageJsonError::Read { .. }));
  }

  #[test]
  fn load_reports_bad_json() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("package.json"), "{ not json").unwrap();
    let err = PackageJson::load(temp.path()).unwrap_err();
    assert!(matches!(err, PackageJsonError::Parse { .. }));
  }
}
