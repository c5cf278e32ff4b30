//! Closure, copy and metadata behavior of whole deployments.

use std::fs;

use nodeploy_lib::config::ConfigError;
use nodeploy_lib::resolve::ResolveError;
use nodeploy_lib::{DeployError, deploy};

use super::common::{TestRepo, is_empty_dir, project_paths};

/// `app` depends on `lib-a`; `lib-a` declares a peer `@types/node` that is
/// excluded by settings and missing on disk.
fn app_with_lib(repo: &TestRepo) {
  repo.package(
    "apps/app",
    r#"{ "name": "app", "version": "1.0.0", "dependencies": { "lib-a": "workspace:*" } }"#,
  );
  repo.file("apps/app/index.js", "require('lib-a');");
  repo.package(
    "node_modules/lib-a",
    r#"{ "name": "lib-a", "version": "1.0.0",
         "dependencies": { "left-pad": "^1.0.0" },
         "peerDependencies": { "@types/node": "*" } }"#,
  );
  repo.file("node_modules/lib-a/lib/index.js", "module.exports = 1;");
  repo.package("node_modules/left-pad", r#"{ "name": "left-pad", "version": "1.3.0" }"#);
  repo.file("node_modules/left-pad/index.js", "module.exports = 2;");
}

#[tokio::test]
async fn deploys_app_with_filtered_library() {
  let repo = TestRepo::new();
  app_with_lib(&repo);
  repo.package("apps/other", r#"{ "name": "other" }"#);

  let projects = vec![
    repo.project("app", "apps/app"),
    repo.project("lib-a", "node_modules/lib-a").with_dependencies_to_exclude(["@types/*"]),
    repo.project("other", "apps/other"),
  ];
  let report = deploy(repo.options("app", projects)).await.unwrap();

  assert_eq!(report.folders_copied, 3);
  assert_eq!(report.links, 0);
  assert!(repo.deployed("apps/app/index.js").is_file());
  assert!(repo.deployed("node_modules/lib-a/lib/index.js").is_file());
  assert!(repo.deployed("node_modules/left-pad/index.js").is_file());
  assert!(!repo.deployed("node_modules/@types").exists());
  assert!(!repo.deployed("apps/other").exists());

  let metadata = repo.metadata();
  assert_eq!(metadata.scenario_name, "default");
  assert_eq!(metadata.main_project_name, "app");
  assert_eq!(project_paths(&metadata), vec!["apps/app", "node_modules/lib-a"]);
  assert!(metadata.links.is_empty());
}

#[tokio::test]
async fn missing_required_dependency_fails_with_its_name() {
  let repo = TestRepo::new();
  repo.package("apps/app", r#"{ "name": "app", "dependencies": { "ghost": "1.0.0" } }"#);

  let err = deploy(repo.options("app", vec![repo.project("app", "apps/app")]))
    .await
    .unwrap_err();

  match err.dependency_not_found() {
    Some(ResolveError::DependencyNotFound { package_name, .. }) => assert_eq!(package_name, "ghost"),
    other => panic!("unexpected error: {err} ({other:?})"),
  }
}

#[tokio::test]
async fn additional_projects_are_deployed_alongside() {
  let repo = TestRepo::new();
  repo.package("apps/app", r#"{ "name": "app" }"#);
  repo.package("apps/worker", r#"{ "name": "worker" }"#);
  repo.file("apps/worker/worker.js", "");

  let projects = vec![
    repo.project("app", "apps/app").with_additional_projects(["worker"]),
    repo.project("worker", "apps/worker"),
  ];
  deploy(repo.options("app", projects)).await.unwrap();

  assert!(repo.deployed("apps/worker/worker.js").is_file());
  assert_eq!(project_paths(&repo.metadata()), vec!["apps/app", "apps/worker"]);
}

#[tokio::test]
async fn unknown_main_project_is_a_config_error() {
  let repo = TestRepo::new();
  repo.package("apps/app", r#"{ "name": "app" }"#);

  let err = deploy(repo.options("ghost", vec![repo.project("app", "apps/app")]))
    .await
    .unwrap_err();

  assert!(matches!(err, DeployError::Config(ConfigError::MainProjectNotFound(_))));
}

mod overwrite_guard {
  use super::*;

  #[tokio::test]
  async fn non_empty_target_fails_before_copying() {
    let repo = TestRepo::new();
    app_with_lib(&repo);
    fs::create_dir_all(repo.target()).unwrap();
    fs::write(repo.target().join("stale.txt"), "old").unwrap();

    let err = deploy(repo.options("app", vec![repo.project("app", "apps/app")]))
      .await
      .unwrap_err();

    assert!(matches!(err, DeployError::Config(ConfigError::TargetNotEmpty(_))));
    assert!(repo.deployed("stale.txt").is_file());
    assert!(!repo.deployed("apps").exists());
  }

  #[tokio::test]
  async fn overwrite_clears_target_first() {
    let repo = TestRepo::new();
    app_with_lib(&repo);
    fs::create_dir_all(repo.target().join("old")).unwrap();
    fs::write(repo.target().join("old/stale.txt"), "old").unwrap();

    deploy(
      repo
        .options("app", vec![repo.project("app", "apps/app")])
        .with_overwrite(true),
    )
    .await
    .unwrap();

    assert!(!repo.deployed("old").exists());
    assert!(repo.deployed("apps/app/index.js").is_file());
  }
}

mod archive {
  use super::*;

  #[tokio::test]
  async fn unsupported_extension_fails_before_any_work() {
    let repo = TestRepo::new();
    app_with_lib(&repo);

    let err = deploy(
      repo
        .options("app", vec![repo.project("app", "apps/app")])
        .with_archive(repo.scratch("deploy.tar.gz")),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DeployError::Config(ConfigError::UnsupportedArchiveExtension(_))));
    assert!(!repo.target().exists() || is_empty_dir(&repo.target()));
  }

  #[tokio::test]
  async fn zip_is_written_after_deploying() {
    let repo = TestRepo::new();
    app_with_lib(&repo);
    let archive = repo.scratch("out/deploy.zip");

    let report = deploy(
      repo
        .options("app", vec![repo.project("app", "apps/app")])
        .with_archive(&archive),
    )
    .await
    .unwrap();

    assert_eq!(report.archive_path.as_deref(), Some(archive.as_path()));
    assert!(archive.is_file());
  }
}

#[tokio::test]
async fn folder_to_copy_lands_in_target_root() {
  let repo = TestRepo::new();
  repo.package("apps/app", r#"{ "name": "app" }"#);
  repo.file("common/deploy-extras/start.sh", "node apps/app");

  deploy(
    repo
      .options("app", vec![repo.project("app", "apps/app")])
      .with_folder_to_copy("common/deploy-extras"),
  )
  .await
  .unwrap();

  assert!(repo.deployed("start.sh").is_file());
}

#[tokio::test]
async fn project_folders_use_packlist_and_others_copy_whole() {
  let repo = TestRepo::new();
  repo.package(
    "apps/app",
    r#"{ "name": "app", "files": ["dist"], "dependencies": { "dep": "1" } }"#,
  );
  repo.file("apps/app/dist/main.js", "");
  repo.file("apps/app/src/main.ts", "");
  repo.package("apps/app/node_modules/dep", r#"{ "name": "dep", "files": ["lib"] }"#);
  repo.file("apps/app/node_modules/dep/lib/index.js", "");
  repo.file("apps/app/node_modules/dep/test/index.test.js", "");

  deploy(repo.options("app", vec![repo.project("app", "apps/app")]))
    .await
    .unwrap();

  assert!(repo.deployed("apps/app/dist/main.js").is_file());
  assert!(!repo.deployed("apps/app/src").exists());
  assert!(repo.deployed("apps/app/node_modules/dep/lib/index.js").is_file());
  assert!(repo.deployed("apps/app/node_modules/dep/test/index.test.js").is_file());
}

#[tokio::test]
async fn scenario_name_is_recorded() {
  let repo = TestRepo::new();
  repo.package("apps/app", r#"{ "name": "app" }"#);

  deploy(
    repo
      .options("app", vec![repo.project("app", "apps/app")])
      .with_scenario_name("prod"),
  )
  .await
  .unwrap();

  assert_eq!(repo.metadata().scenario_name, "prod");
}
