//! Link recreation, link scripts and bin shims in whole deployments.

use std::fs;
use std::path::PathBuf;

use nodeploy_lib::LinkCreationMode;
use nodeploy_lib::consts::CREATE_LINKS_SCRIPT_FILENAME;
use nodeploy_lib::deploy;
use nodeploy_lib::symlink::LinkKind;

use super::common::TestRepo;

/// `apps/app/node_modules/lib-a` is a workspace link to `libraries/lib-a`.
#[cfg(unix)]
fn linked_workspace(repo: &TestRepo) {
  repo.package("apps/app", r#"{ "name": "app", "dependencies": { "lib-a": "workspace:*" } }"#);
  repo.package("libraries/lib-a", r#"{ "name": "lib-a", "main": "index.js" }"#);
  repo.file("libraries/lib-a/index.js", "module.exports = 1;");
  repo.symlink("apps/app/node_modules/lib-a", "../../../libraries/lib-a");
}

#[cfg(unix)]
fn workspace_projects(repo: &TestRepo) -> Vec<nodeploy_lib::DeployProjectConfiguration> {
  vec![
    repo.project("app", "apps/app"),
    repo.project("lib-a", "libraries/lib-a"),
  ]
}

#[cfg(unix)]
#[tokio::test]
async fn workspace_links_are_recreated_relative() {
  let repo = TestRepo::new();
  linked_workspace(&repo);

  let report = deploy(repo.options("app", workspace_projects(&repo))).await.unwrap();

  assert_eq!(report.links, 1);
  let link = repo.deployed("apps/app/node_modules/lib-a");
  assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("../../../libraries/lib-a"));
  assert!(link.join("index.js").is_file());

  let metadata = repo.metadata();
  assert_eq!(metadata.links.len(), 1);
  assert_eq!(metadata.links[0].kind, LinkKind::FolderLink);
  assert_eq!(metadata.links[0].link_path, "apps/app/node_modules/lib-a");
  assert_eq!(metadata.links[0].target_path, "libraries/lib-a");
}

#[cfg(unix)]
#[tokio::test]
async fn script_mode_defers_link_creation() {
  let repo = TestRepo::new();
  linked_workspace(&repo);

  deploy(
    repo
      .options("app", workspace_projects(&repo))
      .with_link_creation(LinkCreationMode::Script),
  )
  .await
  .unwrap();

  let link = repo.deployed("apps/app/node_modules/lib-a");
  assert!(fs::symlink_metadata(&link).is_err());
  assert!(repo.deployed(CREATE_LINKS_SCRIPT_FILENAME).is_file());

  let created = nodeploy_lib::links::create_links(&repo.target(), &nodeploy_lib::links::SymlinkCreator).unwrap();
  assert_eq!(created, 1);
  assert!(link.join("index.js").is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn none_mode_only_records_links() {
  let repo = TestRepo::new();
  linked_workspace(&repo);

  deploy(
    repo
      .options("app", workspace_projects(&repo))
      .with_link_creation(LinkCreationMode::None),
  )
  .await
  .unwrap();

  assert!(fs::symlink_metadata(repo.deployed("apps/app/node_modules/lib-a")).is_err());
  assert!(!repo.deployed(CREATE_LINKS_SCRIPT_FILENAME).exists());
  assert_eq!(repo.metadata().links.len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn bins_are_linked_for_deployed_projects() {
  let repo = TestRepo::new();
  repo.package("apps/app", r#"{ "name": "app", "dependencies": { "tool": "1.0.0" } }"#);
  repo.package(
    "apps/app/node_modules/tool",
    r#"{ "name": "tool", "bin": { "tool": "cli.js" } }"#,
  );
  repo.file("apps/app/node_modules/tool/cli.js", "#!/usr/bin/env node\n");

  deploy(repo.options("app", vec![repo.project("app", "apps/app")]))
    .await
    .unwrap();

  let shim = repo.deployed("apps/app/node_modules/.bin/tool");
  assert_eq!(fs::read_link(&shim).unwrap(), PathBuf::from("../tool/cli.js"));
}

#[cfg(unix)]
#[tokio::test]
async fn pnpm_store_links_are_followed_and_recreated() {
  let repo = TestRepo::new();
  let store = "common/temp/node_modules/.pnpm/dep@1.0.0/node_modules/dep";
  repo.package(store, r#"{ "name": "dep" }"#);
  repo.file(&format!("{store}/index.js"), "");
  repo.symlink(
    "common/temp/node_modules/.pnpm/node_modules/dep",
    "../dep@1.0.0/node_modules/dep",
  );
  repo.package("apps/app", r#"{ "name": "app", "dependencies": { "dep": "1.0.0" } }"#);
  repo.symlink(
    "apps/app/node_modules/dep",
    "../../../common/temp/node_modules/.pnpm/dep@1.0.0/node_modules/dep",
  );

  let report = deploy(
    repo
      .options("app", vec![repo.project("app", "apps/app")])
      .with_pnpm_install_folder(repo.source().join("common/temp")),
  )
  .await
  .unwrap();

  assert_eq!(report.links, 2);
  assert!(repo.deployed(&format!("{store}/index.js")).is_file());
  assert!(repo.deployed("apps/app/node_modules/dep/index.js").is_file());
  assert!(
    repo
      .deployed("common/temp/node_modules/.pnpm/node_modules/dep/index.js")
      .is_file()
  );
}

#[tokio::test]
async fn deployment_without_links_has_empty_link_list() {
  let repo = TestRepo::new();
  repo.package("apps/app", r#"{ "name": "app" }"#);

  let report = deploy(repo.options("app", vec![repo.project("app", "apps/app")]))
    .await
    .unwrap();

  assert_eq!(report.links, 0);
  assert!(repo.metadata().links.is_empty());
}
