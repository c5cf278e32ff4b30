/// Name of the manifest written at the root of every deployment.
pub const DEPLOY_METADATA_FILENAME: &str = "deploy-metadata.json";

/// Name of the deferred link-creation script written in `script` link mode.
pub const CREATE_LINKS_SCRIPT_FILENAME: &str = "create-links.js";

/// The only archive extension accepted for `create_archive_file_path`.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Ceiling on in-flight folder analyses and folder copies.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Name of a package manifest file.
pub const PACKAGE_JSON_FILENAME: &str = "package.json";

/// Name of the dependency install folder.
pub const NODE_MODULES_DIR: &str = "node_modules";

/// Folder inside `node_modules` that holds pnpm's workaround links.
pub const PNPM_VIRTUAL_STORE_DIR: &str = ".pnpm";

/// Folder inside `node_modules` that holds executable shims.
pub const BIN_DIR: &str = ".bin";
