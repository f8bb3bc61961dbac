//! Orchestrator behaviour across whole runs

use accrete_capability::{Capability, Contributions, LogLevel, LoggerSpec, MountSpec};
use accrete_composition::MergeError;
use accrete_core::prelude::*;
use accrete_test_utils::{
    arg_capability, id, rest_auth_capability, room_rules_capability, standard_source,
    CountingSource, REST_AUTH_SOURCE,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn orchestrator(dir: &TempDir, source: CountingSource) -> CapabilityOrchestrator<CountingSource> {
    let config = EngineConfig::new().with_extension_dir(dir.path());
    CapabilityOrchestrator::with_config(source, &config)
}

fn logger_capability(name: &str, index: usize, level: LogLevel) -> Capability {
    Capability::new(id(name))
        .with_declaration_index(index)
        .with_contributions(Contributions::new().with_logger(LoggerSpec::new("synapse.storage", level)))
}

fn mount_capability(name: &str, index: usize, source: &str) -> Capability {
    Capability::new(id(name))
        .with_declaration_index(index)
        .with_contributions(
            Contributions::new().with_mount(MountSpec::read_only(source, "/usr/lib/shared.py")),
        )
}

#[tokio::test]
async fn missing_setting_is_named_and_nothing_happens() {
    let dir = tempfile::tempdir().unwrap();
    let source = standard_source();
    let mut orch = orchestrator(&dir, source.clone());

    let caps = vec![rest_auth_capability(None, 0)];
    let err = orch.run(&caps).await.unwrap_err();

    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(err.capability(), Some(&id("password_provider_rest_auth")));
    assert!(err.to_string().contains("'endpoint' is missing"));

    assert_eq!(source.downloads(), 0);
    assert!(!dir.path().join("rest_auth_provider.py").exists());
    assert!(orch.store().is_empty());

    let record = orch.report().get(&id("password_provider_rest_auth")).unwrap();
    assert_eq!(record.state, CapabilityState::Failed);
}

#[tokio::test]
async fn successful_run_places_artifact_and_merges() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = orchestrator(&dir, standard_source());

    let caps = vec![
        rest_auth_capability(Some("https://auth.example.org"), 0),
        room_rules_capability(Some("https://id.example.org"), 1),
    ];
    let store = orch.run(&caps).await.unwrap();

    assert_eq!(store.mounts().len(), 2);
    assert_eq!(store.modules().len(), 2);
    assert_eq!(
        std::fs::read(dir.path().join("rest_auth_provider.py")).unwrap(),
        REST_AUTH_SOURCE
    );

    let report = orch.report();
    assert_eq!(report.count(CapabilityState::Done), 2);
    assert_eq!(report.downloads(), 2);
    assert!(report.finished_at.is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn artifact_defaults_to_read_only_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let mut orch = orchestrator(&dir, standard_source());
    orch.run(&[rest_auth_capability(Some("https://auth.example.org"), 0)])
        .await
        .unwrap();

    let mode = std::fs::metadata(dir.path().join("rest_auth_provider.py"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o444);
}

#[cfg(unix)]
#[tokio::test]
async fn rerun_restores_drifted_artifact_mode_without_download() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let source = standard_source();
    let mut orch = orchestrator(&dir, source.clone());
    let caps = vec![rest_auth_capability(Some("https://auth.example.org"), 0)];

    let before = orch.run(&caps).await.unwrap().clone();
    let path = dir.path().join("rest_auth_provider.py");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o666)).unwrap();

    let after = orch.run(&caps).await.unwrap();
    assert_eq!(after, &before);
    assert_eq!(source.downloads(), 1);

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o444);

    let record = orch.report().get(&id("password_provider_rest_auth")).unwrap();
    assert!(!record.skipped);
    assert!(!record.fetch.as_ref().unwrap().downloaded());
    assert_eq!(record.state, CapabilityState::Done);
}

#[tokio::test]
async fn rerun_is_idempotent_without_fetches() {
    let dir = tempfile::tempdir().unwrap();
    let source = standard_source();
    let mut orch = orchestrator(&dir, source.clone());
    let caps = vec![
        rest_auth_capability(Some("https://auth.example.org"), 0),
        arg_capability("metrics", 0, 1),
    ];

    let first = orch.run(&caps).await.unwrap().snapshot();
    assert_eq!(source.downloads(), 1);

    let second = orch.run(&caps).await.unwrap().snapshot();
    assert_eq!(second, first);
    assert_eq!(source.downloads(), 1);
    assert_eq!(orch.report().skipped(), 2);
}

#[tokio::test]
async fn rerun_from_persisted_snapshot_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let source = standard_source();
    let caps = vec![rest_auth_capability(Some("https://auth.example.org"), 0)];

    let mut first = orchestrator(&dir, source.clone());
    first.run(&caps).await.unwrap();
    let json = serde_json::to_string(&first.store().snapshot()).unwrap();

    let snapshot: StoreSnapshot = serde_json::from_str(&json).unwrap();
    let mut second = orchestrator(&dir, source.clone())
        .with_store(AccretionStore::from_snapshot(snapshot).unwrap());
    let store = second.run(&caps).await.unwrap();

    assert_eq!(store, first.store());
    assert_eq!(source.downloads(), 1);
}

#[tokio::test]
async fn deleted_artifact_is_refetched_but_not_remerged() {
    let dir = tempfile::tempdir().unwrap();
    let source = standard_source();
    let mut orch = orchestrator(&dir, source.clone());
    let caps = vec![rest_auth_capability(Some("https://auth.example.org"), 0)];

    let before = orch.run(&caps).await.unwrap().clone();
    std::fs::remove_file(dir.path().join("rest_auth_provider.py")).unwrap();

    let after = orch.run(&caps).await.unwrap();
    assert_eq!(after, &before);
    assert_eq!(source.downloads(), 2);
    assert!(dir.path().join("rest_auth_provider.py").exists());

    let record = orch.report().get(&id("password_provider_rest_auth")).unwrap();
    assert!(!record.skipped);
    assert_eq!(record.state, CapabilityState::Done);
}

#[tokio::test]
async fn force_refresh_downloads_again() {
    let dir = tempfile::tempdir().unwrap();
    let source = standard_source();
    let caps = vec![rest_auth_capability(Some("https://auth.example.org"), 0)];

    let mut orch = orchestrator(&dir, source.clone());
    orch.run(&caps).await.unwrap();

    let mut forced = orchestrator(&dir, source.clone())
        .with_store(orch.into_store())
        .with_force_refresh(true);
    forced.run(&caps).await.unwrap();

    assert_eq!(source.downloads(), 2);
    assert_eq!(forced.report().downloads(), 1);
}

#[tokio::test]
async fn differing_mounts_conflict_identical_mounts_merge() {
    let dir = tempfile::tempdir().unwrap();

    let mut orch = orchestrator(&dir, CountingSource::new());
    let same = vec![
        mount_capability("a", 0, "/ext/shared.py"),
        mount_capability("b", 1, "/ext/shared.py"),
    ];
    let store = orch.run(&same).await.unwrap();
    assert_eq!(store.mounts().len(), 1);

    let mut orch = orchestrator(&dir, CountingSource::new());
    let different = vec![
        mount_capability("a", 0, "/ext/shared.py"),
        mount_capability("b", 1, "/ext/other.py"),
    ];
    let err = orch.run(&different).await.unwrap_err();

    match err {
        EngineError::Merge(MergeError::MountConflict {
            existing_owner,
            incoming_owner,
            ..
        }) => {
            assert_eq!(existing_owner, id("a"));
            assert_eq!(incoming_owner, id("b"));
        }
        other => panic!("expected mount conflict, got {other}"),
    }
    assert!(orch.store().has_contributed(&id("a")));
    assert!(!orch.store().has_contributed(&id("b")));
}

#[tokio::test]
async fn logger_levels_conflict_same_level_appears_once() {
    let dir = tempfile::tempdir().unwrap();

    let mut orch = orchestrator(&dir, CountingSource::new());
    let store = orch
        .run(&[
            logger_capability("a", 0, LogLevel::Info),
            logger_capability("b", 1, LogLevel::Info),
        ])
        .await
        .unwrap();
    assert_eq!(store.render().loggers.len(), 1);

    let mut orch = orchestrator(&dir, CountingSource::new());
    let err = orch
        .run(&[
            logger_capability("a", 0, LogLevel::Info),
            logger_capability("b", 1, LogLevel::Debug),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Merge(MergeError::LoggerConflict { .. })));
}

#[tokio::test]
async fn extra_args_follow_priority_then_declaration() {
    let dir = tempfile::tempdir().unwrap();

    let mut orch = orchestrator(&dir, CountingSource::new());
    let store = orch
        .run(&[arg_capability("a", 10, 0), arg_capability("b", 5, 1)])
        .await
        .unwrap();
    assert_eq!(store.render().extra_args, vec!["--b", "--a"]);

    let mut orch = orchestrator(&dir, CountingSource::new());
    let store = orch
        .run(&[
            arg_capability("x", 0, 0),
            arg_capability("y", 0, 1),
            arg_capability("z", 0, 2),
        ])
        .await
        .unwrap();
    assert_eq!(store.render().extra_args, vec!["--x", "--y", "--z"]);
}

#[tokio::test]
async fn failure_at_k_keeps_earlier_and_skips_later() {
    let dir = tempfile::tempdir().unwrap();
    // No artifact served for room rules: fetch fails at position 2
    let source = CountingSource::new().with_artifact(
        accrete_test_utils::REST_AUTH_URL,
        REST_AUTH_SOURCE,
    );
    let mut orch = orchestrator(&dir, source);

    let caps = vec![
        arg_capability("first", 0, 0),
        rest_auth_capability(Some("https://auth.example.org"), 1),
        room_rules_capability(Some("https://id.example.org"), 2),
        arg_capability("last", 0, 3),
    ];
    let err = orch.run(&caps).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.capability(), Some(&id("room_rules")));

    let store = orch.store();
    assert!(store.has_contributed(&id("first")));
    assert!(store.has_contributed(&id("password_provider_rest_auth")));
    assert!(!store.has_contributed(&id("room_rules")));
    assert!(!store.has_contributed(&id("last")));

    let report = orch.report();
    assert_eq!(report.capabilities.len(), 3);
    assert_eq!(report.failed().unwrap().id, id("room_rules"));
    assert!(report.get(&id("last")).is_none());
}

#[tokio::test]
async fn disabled_capability_is_not_validated() {
    let dir = tempfile::tempdir().unwrap();
    let source = standard_source();
    let mut orch = orchestrator(&dir, source.clone());

    let caps = vec![
        rest_auth_capability(None, 0).with_enabled(false),
        arg_capability("metrics", 0, 1),
    ];
    let store = orch.run(&caps).await.unwrap();

    assert!(!store.has_contributed(&id("password_provider_rest_auth")));
    assert_eq!(source.downloads(), 0);
    assert_eq!(orch.report().count(CapabilityState::Disabled), 1);
}

#[tokio::test]
async fn manifest_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
engine:
  extension_dir: {}
settings:
  endpoint: https://auth.example.org
capabilities:
  - id: password_provider_rest_auth
    priority: 10
    settings:
      - name: endpoint
        kind: url
    artifact:
      source: {}
      dest: rest_auth_provider.py
    contributions:
      extra_args: ["--auth"]
  - id: metrics
    priority: 1
    contributions:
      extra_args: ["--metrics"]
"#,
        dir.path().display(),
        accrete_test_utils::REST_AUTH_URL,
    );
    let path = dir.path().join("deploy.yaml");
    std::fs::write(&path, yaml).unwrap();

    let manifest = Manifest::load(&path).unwrap();
    let caps = manifest.capabilities().unwrap();
    let mut orch = CapabilityOrchestrator::with_config(standard_source(), &manifest.engine);
    let store = orch.run(&caps).await.unwrap();

    assert_eq!(store.render().extra_args, vec!["--metrics", "--auth"]);
    assert!(dir.path().join("rest_auth_provider.py").exists());
}
