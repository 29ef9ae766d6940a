// ABOUTME: Application-wide error type and its classification.
// ABOUTME: Every failure surfaced to the CLI maps onto one ErrorKind.

use crate::deploy::DeployError;
use crate::history::HistoryError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Broad category of a failure, independent of which layer raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid credentials or required settings.
    Configuration,
    /// Dial, handshake, or session failure.
    Transport,
    /// Copy-protocol violation or remote-reported copy error.
    Protocol,
    /// Non-zero exit from a remote command.
    RemoteCommand,
    Build,
    Archive,
    /// History file could not be read, parsed, or written.
    History,
    /// Rollback target is not in the history.
    VersionNotFound,
    /// Local pre-conditions (clean tree, trigger branch) not met.
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::RemoteCommand => "remote command",
            ErrorKind::Build => "build",
            ErrorKind::Archive => "archive",
            ErrorKind::History => "history",
            ErrorKind::VersionNotFound => "version not found",
            ErrorKind::Validation => "validation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Ssh(#[from] crate::ssh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Deploy(e) => e.kind(),
            Error::History(_) => ErrorKind::History,
            Error::Ssh(e) => e.kind(),
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::MissingEnvVar(_)
            | Error::InvalidConfig(_)
            | Error::Io(_)
            | Error::Yaml(_) => ErrorKind::Configuration,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
