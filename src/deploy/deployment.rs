// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: State types carry their own data for compile-time guarantees.

use crate::toolchain::Revision;
use crate::types::ImageRef;

use super::mode::{DeployPlan, DeploymentMode};
use super::state::{CarriesArtifact, Initialized};

/// A deployment in progress, parameterized by its current state.
///
/// Transitions consume the deployment and return it in the next state, so a
/// stage cannot be skipped or repeated.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) plan: DeployPlan,
    pub(crate) state: S,
}

impl Deployment<Initialized> {
    pub fn new(plan: DeployPlan) -> Self {
        Deployment {
            plan,
            state: Initialized,
        }
    }
}

impl<S> Deployment<S> {
    pub fn mode(&self) -> &DeploymentMode {
        &self.plan.mode
    }
}

impl<S: CarriesArtifact> Deployment<S> {
    /// Image under its fresh tag.
    pub fn image(&self) -> &ImageRef {
        &self.state.artifact().image
    }

    pub fn revision(&self) -> &Revision {
        &self.state.artifact().revision
    }
}
