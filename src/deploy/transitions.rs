// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::diagnostics::Diagnostics;
use crate::history::{DeploymentRecord, HistoryStore, RecordDraft};
use crate::ssh::{self, RemoteShell};
use crate::toolchain::{BuildPlan, Toolchain};
use crate::transfer::{TransferJob, TransferProgress};

use super::Deployment;
use super::commands::{self, ComposeRemote};
use super::error::{DeployError, Phase, RemoteResultExt};
use super::mode::DeploymentMode;
use super::state::{
    Archived, Artifact, Built, Initialized, Loaded, Swapped, Transferred, Validated,
};
use super::swap::{replace_container, restart_services};

/// Per-file progress callback: file label plus throttled progress.
pub type ProgressFn<'a> = dyn FnMut(&str, TransferProgress) + Send + 'a;

/// Image tag for a build started at `now`.
///
/// Two builds within the same second get the same tag.
pub fn image_tag(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

impl<S> Deployment<S> {
    fn advance<T>(self, state: T) -> Deployment<T> {
        Deployment {
            plan: self.plan,
            state,
        }
    }

    async fn upload<R: RemoteShell + ?Sized>(
        &self,
        remote: &R,
        local: &Path,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<(), DeployError> {
        let transfer_failed = |source: ssh::Error| DeployError::Transfer {
            file: local.to_path_buf(),
            source,
        };

        let job = TransferJob::prepare(local, self.plan.remote_path(local))
            .await
            .map_err(|e| transfer_failed(e.into()))?;
        let label = local.display().to_string();
        let report = remote
            .upload(&job, &mut |progress| on_progress(&label, progress))
            .await
            .map_err(transfer_failed)?;

        tracing::info!(file = %label, remote = job.remote_path(), bytes = report.bytes, "uploaded");
        Ok(())
    }
}

// =============================================================================
// Initialized -> Validated
// =============================================================================

impl Deployment<Initialized> {
    /// Require a clean working tree on the trigger branch.
    #[must_use = "deployment state must be used"]
    pub async fn validate<T: Toolchain + ?Sized>(
        self,
        tools: &T,
    ) -> Result<Deployment<Validated>, DeployError> {
        if !tools
            .worktree_clean()
            .await
            .map_err(DeployError::SourceControl)?
        {
            return Err(DeployError::DirtyWorktree);
        }

        let branch = tools
            .current_branch()
            .await
            .map_err(DeployError::SourceControl)?;
        if branch != self.plan.trigger_branch {
            return Err(DeployError::WrongBranch {
                expected: self.plan.trigger_branch.clone(),
                actual: branch,
            });
        }

        let revision = tools.head_revision().await;
        tracing::debug!(revision = %revision.id, "pre-conditions satisfied");
        Ok(self.advance(Validated { revision }))
    }
}

// =============================================================================
// Validated -> Built
// =============================================================================

impl Deployment<Validated> {
    /// Build the image under a tag derived from `now`.
    #[must_use = "deployment state must be used"]
    pub async fn build<T: Toolchain + ?Sized>(
        self,
        tools: &T,
        now: DateTime<Utc>,
    ) -> Result<Deployment<Built>, DeployError> {
        let image = self.plan.image.with_tag(image_tag(now));
        let build = match &self.plan.mode {
            DeploymentMode::SingleImage(_) => BuildPlan::Dockerfile {
                image: image.clone(),
                dockerfile: self.plan.dockerfile.clone(),
                context: self.plan.context.clone(),
            },
            DeploymentMode::MultiService(target) => BuildPlan::Compose {
                image: image.clone(),
                file: target.descriptor.clone(),
                service: target.service.clone(),
            },
        };

        tools.build_image(&build).await.map_err(DeployError::Build)?;

        let revision = self.state.revision.clone();
        Ok(self.advance(Built(Artifact { revision, image })))
    }
}

// =============================================================================
// Built -> Archived
// =============================================================================

impl Deployment<Built> {
    /// Save the image to the configured local archive file.
    #[must_use = "deployment state must be used"]
    pub async fn archive<T: Toolchain + ?Sized>(
        self,
        tools: &T,
    ) -> Result<Deployment<Archived>, DeployError> {
        let archive = &self.plan.archive;
        tools
            .save_image(&self.state.0.image, archive)
            .await
            .map_err(DeployError::Archive)?;

        if tokio::fs::metadata(archive).await.is_err() {
            return Err(DeployError::ArchiveMissing(archive.clone()));
        }

        let artifact = self.state.0.clone();
        Ok(self.advance(Archived(artifact)))
    }
}

// =============================================================================
// Archived -> Transferred
// =============================================================================

impl Deployment<Archived> {
    /// Copy compose files (multi-service only) and then the archive.
    ///
    /// Every file goes through its own transfer; the first failure aborts.
    #[must_use = "deployment state must be used"]
    pub async fn transfer<R: RemoteShell + ?Sized>(
        self,
        remote: &R,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<Deployment<Transferred>, DeployError> {
        if let DeploymentMode::MultiService(target) = &self.plan.mode {
            for local in target.uploads() {
                self.upload(remote, local, on_progress).await?;
            }
        }
        self.upload(remote, &self.plan.archive, on_progress).await?;

        let artifact = self.state.0.clone();
        Ok(self.advance(Transferred(artifact)))
    }
}

// =============================================================================
// Transferred -> Loaded
// =============================================================================

impl Deployment<Transferred> {
    /// Load the archive into the remote image store.
    ///
    /// In single-image mode the tagged image must be visible afterwards.
    #[must_use = "deployment state must be used"]
    pub async fn load<R: RemoteShell + ?Sized>(
        self,
        remote: &R,
    ) -> Result<Deployment<Loaded>, DeployError> {
        let plan = &self.plan;
        remote
            .stream(&commands::load_image(&plan.remote_dir, &plan.archive_name()))
            .await
            .during(Phase::Load)?;

        if let DeploymentMode::SingleImage(_) = plan.mode {
            let image = &self.state.0.image;
            let visible = remote
                .capture(&commands::image_visible(image))
                .await
                .during(Phase::Verify)?;
            if visible.trim().is_empty() {
                return Err(DeployError::ImageNotLoaded(image.clone()));
            }
            tracing::debug!(image = visible.trim(), "image visible on remote");
        }

        let artifact = self.state.0.clone();
        Ok(self.advance(Loaded(artifact)))
    }
}

// =============================================================================
// Loaded -> Swapped
// =============================================================================

impl Deployment<Loaded> {
    /// Replace the running container, or restart the compose services.
    #[must_use = "deployment state must be used"]
    pub async fn swap<R: RemoteShell + ?Sized>(
        self,
        remote: &R,
        diag: &mut Diagnostics,
    ) -> Result<Deployment<Swapped>, DeployError> {
        let image = &self.state.0.image;
        match &self.plan.mode {
            DeploymentMode::SingleImage(single) => {
                replace_container(remote, single, image).await?;
            }
            DeploymentMode::MultiService(target) => {
                let compose = ComposeRemote::for_target(&self.plan.remote_dir, target);
                restart_services(remote, &compose, image, diag).await?;
            }
        }

        let artifact = self.state.0.clone();
        Ok(self.advance(Swapped(artifact)))
    }
}

// =============================================================================
// Swapped: record
// =============================================================================

impl Deployment<Swapped> {
    /// Append this deployment to the history.
    ///
    /// The remote side is already switched over; callers treat a failure
    /// here as a warning, not a reason to undo anything.
    pub fn record(
        &self,
        store: &HistoryStore,
        now: DateTime<Utc>,
    ) -> Result<DeploymentRecord, DeployError> {
        let artifact = &self.state.0;
        let services = match &self.plan.mode {
            DeploymentMode::SingleImage(_) => None,
            DeploymentMode::MultiService(target) => Some(target.descriptor_record()),
        };

        let draft = RecordDraft {
            revision: artifact.revision.id.clone(),
            summary: artifact.revision.summary.clone(),
            image: artifact.image.clone(),
            services,
        };
        Ok(store.append(draft, now)?)
    }
}
