// ABOUTME: Error types for the copy protocol engine.
// ABOUTME: Distinguishes remote-reported failures, protocol violations, and local I/O.

use crate::error::ErrorKind;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Protocol stage an acknowledgement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Handshake,
    Metadata,
    Completion,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Handshake => "handshake",
            Stage::Metadata => "metadata",
            Stage::Completion => "completion",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    /// The sink answered with a warning (1) or fatal (2) status.
    #[error("remote sink rejected {stage}: {message}")]
    Rejected {
        stage: Stage,
        fatal: bool,
        message: String,
    },

    #[error("unexpected acknowledgement byte {byte:#04x} during {stage}")]
    UnexpectedAck { stage: Stage, byte: u8 },

    /// `detail` is the last line the sink wrote to stderr, if any.
    #[error("channel closed while waiting for {stage} acknowledgement{}", remote_said(.detail))]
    UnexpectedEof {
        stage: Stage,
        detail: Option<String>,
    },

    #[error("no {stage} acknowledgement after {attempts} attempts ({waited:?})")]
    AckTimeout {
        stage: Stage,
        attempts: u32,
        waited: Duration,
    },

    #[error("sink program exited with status {0}")]
    RemoteExit(u32),

    #[error("{path} changed during transfer: expected {expected} bytes, read {actual}")]
    SourceChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("cannot read {path}: {source}")]
    LocalFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("remote path has no file name: {0}")]
    InvalidRemotePath(String),

    #[error("channel error: {0}")]
    Channel(String),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::Rejected { .. }
            | TransferError::UnexpectedAck { .. }
            | TransferError::UnexpectedEof { .. }
            | TransferError::AckTimeout { .. }
            | TransferError::RemoteExit(_) => ErrorKind::Protocol,
            TransferError::Channel(_) => ErrorKind::Transport,
            TransferError::LocalFile { .. }
            | TransferError::SourceChanged { .. }
            | TransferError::InvalidRemotePath(_) => ErrorKind::Configuration,
        }
    }
}

fn remote_said(detail: &Option<String>) -> String {
    match detail {
        Some(line) => format!(" (remote: {line})"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
