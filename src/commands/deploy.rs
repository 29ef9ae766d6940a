// ABOUTME: Deploy command implementation.
// ABOUTME: Wires config, local tools, the SSH remote, and the history file into the pipeline.

use super::disconnect;
use std::path::Path;
use tugboat::config::Config;
use tugboat::deploy::run_deployment;
use tugboat::diagnostics::Diagnostics;
use tugboat::error::Result;
use tugboat::history::HistoryStore;
use tugboat::output::Output;
use tugboat::ssh::SshRemote;
use tugboat::toolchain::DockerCli;

pub async fn deploy(dir: &Path, mut output: Output) -> Result<()> {
    let config = Config::discover(dir)?;

    output.start_timer();
    let mut diag = Diagnostics::default();

    let tools = DockerCli::new(dir);
    let remote = SshRemote::new(config.session_config());
    let store = HistoryStore::new(dir.join(&config.deploy.history_file));

    let result = run_deployment(&config, &tools, &remote, &store, &output, &mut diag).await;
    disconnect(remote, &mut diag).await;

    // Emit collected warnings
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    let outcome = result?;
    match outcome.version() {
        Some(version) => output.success(&format!(
            "Deployed {} as version {version}",
            outcome.image
        )),
        None => output.success(&format!("Deployed {}", outcome.image)),
    }
    Ok(())
}
