// ABOUTME: Rollback to a previously recorded deployment.
// ABOUTME: Restores only the image reference; mappings come from current config.

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::history::{DeploymentRecord, HistoryStore};
use crate::ssh::RemoteShell;
use crate::types::VersionId;

use super::commands::ComposeRemote;
use super::error::DeployError;
use super::mode::single_image;
use super::swap::{replace_container, restart_services};

/// Put the image recorded under `version` back into service.
///
/// The lookup happens before any remote command, so an unknown version
/// leaves the remote host untouched. The history is never modified.
pub async fn rollback_to<R: RemoteShell + ?Sized>(
    config: &Config,
    version: &VersionId,
    remote: &R,
    store: &HistoryStore,
    diag: &mut Diagnostics,
) -> Result<DeploymentRecord, DeployError> {
    let history = store.load()?;
    let record = history
        .get(version)
        .cloned()
        .ok_or_else(|| DeployError::VersionNotFound(version.clone()))?;

    tracing::info!(%version, image = %record.image, "rolling back");

    match &record.services {
        Some(descriptor) => {
            let compose = ComposeRemote::from_descriptor(&config.deploy.remote_temp_dir, descriptor);
            restart_services(remote, &compose, &record.image, diag).await?;
        }
        None => {
            let single = single_image(config)?;
            replace_container(remote, &single, &record.image).await?;
        }
    }

    Ok(record)
}
