// ABOUTME: The remote-side seam the deploy pipeline talks to.
// ABOUTME: Implemented by SSH sessions, and by scripted fakes in tests.

use super::client::{Session, SessionConfig};
use super::error::Result;
use crate::transfer::{TransferJob, TransferOptions, TransferProgress, TransferReport};
use async_trait::async_trait;
use tokio::sync::OnceCell;

/// Remote operations needed to ship and swap a deployment.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `command` with output streamed to the console; non-zero exit is an error.
    async fn stream(&self, command: &str) -> Result<()>;

    /// Run `command` and return its trimmed combined output; non-zero exit is an error.
    async fn capture(&self, command: &str) -> Result<String>;

    /// Copy one local file to the remote path described by `job`.
    async fn upload(
        &self,
        job: &TransferJob,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<TransferReport>;
}

#[async_trait]
impl RemoteShell for Session {
    async fn stream(&self, command: &str) -> Result<()> {
        self.run(command).await?.check(command).map(|_| ())
    }

    async fn capture(&self, command: &str) -> Result<String> {
        let output = self.run_captured(command).await?.check(command)?;
        Ok(output.unwrap_or_default())
    }

    async fn upload(
        &self,
        job: &TransferJob,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<TransferReport> {
        Session::upload(self, job, &TransferOptions::default(), on_progress).await
    }
}

/// An SSH remote that dials on first use.
///
/// Pipelines that fail local pre-conditions never open a connection, and
/// lookups that fail before any remote step leave the network untouched.
#[derive(Debug)]
pub struct SshRemote {
    config: SessionConfig,
    session: OnceCell<Session>,
}

impl SshRemote {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: OnceCell::new(),
        }
    }

    /// Whether a connection has been opened.
    pub fn is_connected(&self) -> bool {
        self.session.initialized()
    }

    async fn session(&self) -> Result<&Session> {
        self.session
            .get_or_try_init(|| async {
                tracing::info!(host = %self.config.host, port = self.config.port, "connecting");
                Session::connect(self.config.clone()).await
            })
            .await
    }

    /// Close the connection if one was opened.
    pub async fn disconnect(self) -> Result<()> {
        match self.session.into_inner() {
            Some(session) => session.disconnect().await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteShell for SshRemote {
    async fn stream(&self, command: &str) -> Result<()> {
        self.session().await?.stream(command).await
    }

    async fn capture(&self, command: &str) -> Result<String> {
        self.session().await?.capture(command).await
    }

    async fn upload(
        &self,
        job: &TransferJob,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<TransferReport> {
        RemoteShell::upload(self.session().await?, job, on_progress).await
    }
}
