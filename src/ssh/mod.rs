// ABOUTME: SSH client module for the remote side of a deployment.
// ABOUTME: Password or key authentication, command execution, and scp-sink channels.

mod client;
mod error;
mod shell;
mod sink;

pub use client::{
    CommandResult, Credential, ExitStatus, HostKeyPolicy, Secret, Session, SessionConfig,
};
pub use error::{Error, Result};
pub use shell::{RemoteShell, SshRemote};
pub use sink::ChannelSink;
