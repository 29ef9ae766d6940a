// ABOUTME: Deployment orchestration using the type state pattern, plus rollback.
// ABOUTME: Exports state markers, the Deployment struct, and the pipeline entry points.

mod commands;
mod deployment;
mod error;
mod mode;
mod pipeline;
mod rollback;
mod state;
mod swap;
mod transitions;

pub use commands::ComposeRemote;
pub use deployment::Deployment;
pub use error::{DeployError, Phase, RemoteResultExt};
pub use mode::{ComposeTarget, DeployPlan, DeploymentMode, SingleImage, single_image};
pub use pipeline::{DeployOutcome, run_deployment};
pub use rollback::rollback_to;
pub use state::{
    Archived, Artifact, Built, CarriesArtifact, Initialized, Loaded, Swapped, Transferred,
    Validated,
};
pub use transitions::{ProgressFn, image_tag};
