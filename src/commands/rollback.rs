// ABOUTME: Rollback command implementation.
// ABOUTME: Restores a recorded version, or lists the recorded versions.

use super::disconnect;
use std::path::Path;
use tugboat::config::Config;
use tugboat::deploy::rollback_to;
use tugboat::diagnostics::Diagnostics;
use tugboat::error::Result;
use tugboat::history::{self, HistoryStore};
use tugboat::output::{Output, OutputMode};
use tugboat::ssh::SshRemote;
use tugboat::types::VersionId;

pub async fn rollback(dir: &Path, version: &str, mut output: Output) -> Result<()> {
    let config = Config::discover(dir)?;

    output.start_timer();
    let mut diag = Diagnostics::default();
    let version = VersionId::from(version);

    let remote = SshRemote::new(config.session_config());
    let store = HistoryStore::new(dir.join(&config.deploy.history_file));

    output.progress(&format!("Rolling back to version {version}"));
    let result = rollback_to(&config, &version, &remote, &store, &mut diag).await;
    disconnect(remote, &mut diag).await;

    // Emit collected warnings
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    let record = result?;
    output.success(&format!(
        "Rolled back to version {} ({})",
        record.version, record.image
    ));
    Ok(())
}

/// Print recorded deployments, newest first.
pub fn list_versions(dir: &Path, output: Output) -> Result<()> {
    let config = Config::discover(dir)?;
    let path = dir.join(&config.deploy.history_file);

    if output.mode() == OutputMode::Quiet {
        for version in history::list_versions(&path)? {
            println!("{version}");
        }
        return Ok(());
    }

    let history = HistoryStore::new(&path).load()?;
    if history.is_empty() {
        output.progress("No deployments recorded yet");
        return Ok(());
    }

    for record in history.records() {
        if output.mode() == OutputMode::Json {
            if let Ok(json) = serde_json::to_string(record) {
                println!("{json}");
            }
            continue;
        }

        println!(
            "{}  {}  {}  {}  {}",
            record.version,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.image,
            record.revision,
            record.summary
        );
        if let Some(services) = &record.services {
            let target = services.target_env.as_deref().unwrap_or("-");
            println!(
                "    service {} via {} (target: {target})",
                services.service, services.file
            );
        }
    }
    Ok(())
}
