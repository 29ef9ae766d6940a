// ABOUTME: Integration tests for rollback to a recorded version.
// ABOUTME: Verifies lookups, remote command sequences, and that history stays untouched.

mod support;

use support::fake_remote::FakeRemote;
use support::fixtures::{compose_config, record_json, single_image_config, write_history};
use tugboat::deploy::{DeployError, Phase, rollback_to};
use tugboat::diagnostics::{Diagnostics, WarningKind};
use tugboat::error::ErrorKind;
use tugboat::history::HistoryStore;
use tugboat::types::VersionId;

#[tokio::test]
async fn unknown_version_issues_no_remote_commands() {
    let dir = tempfile::tempdir().unwrap();
    let config = single_image_config(dir.path());
    let path = dir.path().join("history.json");
    write_history(&path, &[record_json("100", "myapp:20240101000000")]);
    let remote = FakeRemote::new();

    let err = rollback_to(
        &config,
        &VersionId::from("200"),
        &remote,
        &HistoryStore::new(&path),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DeployError::VersionNotFound(ref v) if v.as_str() == "200"));
    assert_eq!(err.kind(), ErrorKind::VersionNotFound);
    assert!(remote.commands().is_empty());
}

#[tokio::test]
async fn empty_history_is_version_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let config = single_image_config(dir.path());
    let remote = FakeRemote::new();

    let err = rollback_to(
        &config,
        &VersionId::from("100"),
        &remote,
        &HistoryStore::new(dir.path().join("history.json")),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DeployError::VersionNotFound(_)));
    assert!(remote.commands().is_empty());
}

#[tokio::test]
async fn restarts_container_with_recorded_image() {
    support::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = single_image_config(dir.path());
    let path = dir.path().join("history.json");
    write_history(
        &path,
        &[
            record_json("100", "myapp:20240101000000"),
            record_json("200", "myapp:20240201000000"),
        ],
    );
    let before = std::fs::read(&path).unwrap();
    let remote = FakeRemote::new().with_capture("docker ps -a", "app1");

    let record = rollback_to(
        &config,
        &VersionId::from("100"),
        &remote,
        &HistoryStore::new(&path),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap();

    assert_eq!(record.image.to_string(), "myapp:20240101000000");
    let stop = remote.position("docker stop app1").unwrap();
    let remove = remote.position("docker rm app1").unwrap();
    let run = remote.position("docker run").unwrap();
    assert!(stop < remove && remove < run);

    // Mappings come from the current config.
    let run_command = &remote.commands()[run];
    assert!(run_command.contains("myapp:20240101000000"));
    assert!(run_command.contains("80:80"));
    assert!(run_command.contains("APP_ENV=production"));

    assert_eq!(std::fs::read(&path).unwrap(), before, "history is not modified");
}

#[tokio::test]
async fn failed_remove_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = single_image_config(dir.path());
    let path = dir.path().join("history.json");
    write_history(&path, &[record_json("100", "myapp:20240101000000")]);
    let remote = FakeRemote::new()
        .with_capture("docker ps -a", "app1")
        .failing("docker rm");

    let err = rollback_to(
        &config,
        &VersionId::from("100"),
        &remote,
        &HistoryStore::new(&path),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        DeployError::Remote {
            phase: Phase::Remove,
            ..
        }
    ));
    assert!(remote.position("docker run").is_none());
}

#[tokio::test]
async fn compose_record_pins_descriptor_and_restarts_services() {
    let dir = tempfile::tempdir().unwrap();
    let config = compose_config(dir.path());
    let path = dir.path().join("history.json");
    let mut record = record_json("100", "myapp:20240101000000");
    record["services"] = serde_json::json!({
        "service": "web",
        "file": "docker-compose.yml",
        "env_files": [".env.production"],
        "target_env": "staging",
    });
    write_history(&path, &[record]);
    let remote = FakeRemote::new().failing(" down");
    let mut diag = Diagnostics::default();

    rollback_to(
        &config,
        &VersionId::from("100"),
        &remote,
        &HistoryStore::new(&path),
        &mut diag,
    )
    .await
    .unwrap();

    let commands = remote.commands();
    assert_eq!(commands.len(), 3);
    assert!(commands[0].ends_with(" down"));
    assert!(commands[1].starts_with("sed -i -E"));
    assert!(commands[1].contains("myapp:20240101000000"));
    assert!(commands[1].ends_with("/srv/app/docker-compose.yml"));
    assert!(commands[2].contains("TARGET_ENV=staging"));
    assert!(commands[2].ends_with("up -d"));
    assert_eq!(diag.warnings()[0].kind, WarningKind::AdvisoryCommand);
}
