// ABOUTME: Replacing the running container or compose services with a given image.
// ABOUTME: Shared by the deploy pipeline and rollback.

use crate::diagnostics::{Diagnostics, Warning};
use crate::ssh::RemoteShell;
use crate::types::ImageRef;

use super::commands::{self, ComposeRemote};
use super::error::{DeployError, Phase, RemoteResultExt};
use super::mode::SingleImage;

/// Stop and remove the configured container if it exists, then start `image`.
///
/// An absent container is skipped; once it is known to exist, failing to
/// stop or remove it aborts before anything new is started.
pub(crate) async fn replace_container<R: RemoteShell + ?Sized>(
    remote: &R,
    single: &SingleImage,
    image: &ImageRef,
) -> Result<(), DeployError> {
    let existing = remote
        .capture(&commands::container_exists(&single.container))
        .await
        .during(Phase::Inspect)?;

    if existing.trim().is_empty() {
        tracing::info!(container = %single.container, "no existing container, skipping stop and remove");
    } else {
        tracing::info!(container = %single.container, "stopping existing container");
        remote
            .stream(&commands::stop_container(&single.container))
            .await
            .during(Phase::Stop)?;
        remote
            .stream(&commands::remove_container(&single.container))
            .await
            .during(Phase::Remove)?;
    }

    remote
        .stream(&commands::run_container(single, image))
        .await
        .during(Phase::Run)?;
    tracing::info!(container = %single.container, %image, "container started");
    Ok(())
}

/// Bring services down (advisory), pin the service image, bring them up.
pub(crate) async fn restart_services<R: RemoteShell + ?Sized>(
    remote: &R,
    compose: &ComposeRemote,
    image: &ImageRef,
    diag: &mut Diagnostics,
) -> Result<(), DeployError> {
    if let Err(e) = remote.stream(&compose.down()).await {
        diag.warn(Warning::advisory_command(format!(
            "bringing services down failed, continuing: {e}"
        )));
    }

    remote
        .stream(&compose.pin_image(image))
        .await
        .during(Phase::PinImage)?;
    remote
        .stream(&compose.up())
        .await
        .during(Phase::ComposeUp)?;
    tracing::info!(service = compose.service(), %image, "services started");
    Ok(())
}
