//! nodeploy-lib: dependency-closure deployment for Node.js monorepos
//!
//! Copies a project, its `additionalProjectsToInclude`, and every folder
//! their runtime dependencies resolve to into a self-contained target folder:
//! - `crawl`: follows dependencies to the real folders they load from
//! - `copy`: copies each folder (packlist or whole tree)
//! - `links`: recreates the symlinks crossed along the way
//! - `metadata`: describes the result in `deploy-metadata.json`
//!
//! [`deploy::deploy`] runs all of it.

pub mod archive;
pub mod config;
pub mod consts;
pub mod copy;
pub mod crawl;
pub mod deploy;
pub mod filter;
pub mod links;
pub mod metadata;
pub mod package_json;
pub mod packlist;
pub mod paths;
pub mod projects;
pub mod resolve;
pub mod scenario;
pub mod state;
pub mod symlink;

pub use config::{ConfigError, DeployOptions, DeployProjectConfiguration, LinkCreationMode};
pub use deploy::{DeployError, DeployReport, Deployer, deploy};
