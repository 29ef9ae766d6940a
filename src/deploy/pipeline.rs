// ABOUTME: The full deploy run: validate, build, archive, transfer, load, swap, record.
// ABOUTME: Drives the typestate machine and reports stage progress.

use chrono::Utc;

use crate::config::Config;
use crate::diagnostics::{Diagnostics, Warning};
use crate::history::{DeploymentRecord, HistoryStore};
use crate::output::Output;
use crate::ssh::RemoteShell;
use crate::toolchain::Toolchain;
use crate::types::{ImageRef, VersionId};

use super::Deployment;
use super::error::DeployError;
use super::mode::DeployPlan;

/// Result of a deployment whose remote side completed.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub image: ImageRef,
    /// `None` when the history could not be written.
    pub record: Option<DeploymentRecord>,
}

impl DeployOutcome {
    pub fn version(&self) -> Option<&VersionId> {
        self.record.as_ref().map(|r| &r.version)
    }
}

/// Run every stage in order. Any stage error aborts; nothing already done
/// is undone. A history write failure only produces a warning.
pub async fn run_deployment<T, R>(
    config: &Config,
    tools: &T,
    remote: &R,
    store: &HistoryStore,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<DeployOutcome, DeployError>
where
    T: Toolchain + ?Sized,
    R: RemoteShell + ?Sized,
{
    let plan = DeployPlan::from_config(config)?;
    let image = plan.image.clone();
    let deployment = Deployment::new(plan);
    output.progress(&format!("Deploying {image} ({})", deployment.mode().label()));

    output.progress("  → Checking working tree...");
    let deployment = deployment.validate(tools).await?;

    output.progress("  → Building image...");
    let deployment = deployment.build(tools, Utc::now()).await?;
    output.progress(&format!("  → Built {}", deployment.image()));

    output.progress("  → Saving image archive...");
    let deployment = deployment.archive(tools).await?;

    output.progress("  → Transferring files...");
    let deployment = deployment
        .transfer(remote, &mut |file, progress| {
            output.transfer_progress(file, &progress)
        })
        .await?;

    output.progress("  → Loading image on remote...");
    let deployment = deployment.load(remote).await?;

    output.progress("  → Swapping containers...");
    let deployment = deployment.swap(remote, diag).await?;

    let record = match deployment.record(store, Utc::now()) {
        Ok(record) => {
            output.progress(&format!("  → Recorded version {}", record.version));
            Some(record)
        }
        Err(e) => {
            diag.warn(Warning::history_not_recorded(format!(
                "deployment succeeded but was not recorded in {}: {e}",
                store.path().display()
            )));
            None
        }
    };

    Ok(DeployOutcome {
        image: deployment.image().clone(),
        record,
    })
}
