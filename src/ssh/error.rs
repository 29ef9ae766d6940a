// ABOUTME: SSH-specific error types.
// ABOUTME: Covers credential resolution, connection, remote command, and transfer failures.

use crate::error::ErrorKind;
use crate::transfer::TransferError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no SSH credentials configured: set a password or a private key path")]
    AuthConfigMissing,

    #[error("cannot read private key {path}: {reason}")]
    KeyUnreadable { path: PathBuf, reason: String },

    #[error("cannot parse private key {path}: {reason}")]
    KeyUnparseable { path: PathBuf, reason: String },

    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("authentication rejected for user {0}")]
    AuthenticationFailed(String),

    #[error("failed to open channel: {0}")]
    ChannelFailed(String),

    #[error("command timed out after {0:?}")]
    CommandTimeout(std::time::Duration),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("remote command `{command}` failed: {exit_info}")]
    RemoteCommandFailed { command: String, exit_info: String },

    #[error("file transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AuthConfigMissing | Error::KeyUnreadable { .. } | Error::KeyUnparseable { .. } => {
                ErrorKind::Configuration
            }
            Error::RemoteCommandFailed { .. } => ErrorKind::RemoteCommand,
            Error::Transfer(e) => e.kind(),
            Error::ConnectFailed(_)
            | Error::AuthenticationFailed(_)
            | Error::ChannelFailed(_)
            | Error::CommandTimeout(_)
            | Error::ChannelClosed
            | Error::Protocol(_)
            | Error::Io(_) => ErrorKind::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
