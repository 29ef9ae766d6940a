// ABOUTME: Error types for deployment and rollback operations.
// ABOUTME: Remote failures carry the phase they happened in.

use crate::error::ErrorKind;
use crate::history::HistoryError;
use crate::ssh;
use crate::toolchain::ToolchainError;
use crate::types::{ImageRef, VersionId};
use std::fmt;
use std::path::PathBuf;

/// Remote step a command belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Load,
    Verify,
    Inspect,
    Stop,
    Remove,
    Run,
    ComposeUp,
    PinImage,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Load => "load image",
            Phase::Verify => "verify image",
            Phase::Inspect => "inspect container",
            Phase::Stop => "stop container",
            Phase::Remove => "remove container",
            Phase::Run => "start container",
            Phase::ComposeUp => "bring services up",
            Phase::PinImage => "pin service image",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during deployment state transitions and rollback.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("working tree has uncommitted changes")]
    DirtyWorktree,

    #[error("deployments run from branch `{expected}`, but `{actual}` is checked out")]
    WrongBranch { expected: String, actual: String },

    #[error("source control check failed: {0}")]
    SourceControl(#[source] ToolchainError),

    #[error("image build failed: {0}")]
    Build(#[source] ToolchainError),

    #[error("image archive failed: {0}")]
    Archive(#[source] ToolchainError),

    #[error("image archive {} was not produced", .0.display())]
    ArchiveMissing(PathBuf),

    #[error("transfer of {} failed: {source}", file.display())]
    Transfer { file: PathBuf, source: ssh::Error },

    #[error("failed to {phase}: {source}")]
    Remote { phase: Phase, source: ssh::Error },

    #[error("image {0} is not visible on the remote host after loading")]
    ImageNotLoaded(ImageRef),

    #[error("version {0} not found in history")]
    VersionNotFound(VersionId),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::DirtyWorktree
            | DeployError::WrongBranch { .. }
            | DeployError::SourceControl(_) => ErrorKind::Validation,
            DeployError::Build(_) => ErrorKind::Build,
            DeployError::Archive(_) | DeployError::ArchiveMissing(_) => ErrorKind::Archive,
            DeployError::Transfer { source, .. } | DeployError::Remote { source, .. } => {
                source.kind()
            }
            DeployError::ImageNotLoaded(_) => ErrorKind::RemoteCommand,
            DeployError::VersionNotFound(_) => ErrorKind::VersionNotFound,
            DeployError::History(_) => ErrorKind::History,
            DeployError::Config(_) => ErrorKind::Configuration,
        }
    }
}

/// Tag remote results with the phase they belong to.
pub trait RemoteResultExt<T> {
    fn during(self, phase: Phase) -> Result<T, DeployError>;
}

impl<T> RemoteResultExt<T> for ssh::Result<T> {
    fn during(self, phase: Phase) -> Result<T, DeployError> {
        self.map_err(|source| DeployError::Remote { phase, source })
    }
}
