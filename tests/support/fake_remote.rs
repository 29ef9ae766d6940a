// ABOUTME: In-memory RemoteShell that records every command it is asked to run.
// ABOUTME: Output and failures are scripted by substring match on the command.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tugboat::ssh::{Error, RemoteShell, Result};
use tugboat::transfer::{TransferJob, TransferProgress, TransferReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub local: PathBuf,
    pub remote: String,
    pub size: u64,
}

#[derive(Default)]
pub struct FakeRemote {
    log: Mutex<Vec<String>>,
    uploads: Mutex<Vec<Upload>>,
    captures: Vec<(String, String)>,
    failures: Vec<String>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` print `output` when captured.
    pub fn with_capture(mut self, pattern: &str, output: &str) -> Self {
        self.captures.push((pattern.to_string(), output.to_string()));
        self
    }

    /// Commands (or upload destinations) containing `pattern` exit non-zero.
    pub fn failing(mut self, pattern: &str) -> Self {
        self.failures.push(pattern.to_string());
        self
    }

    /// Every command and upload, in issue order. Uploads appear as `upload <remote path>`.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    /// Index of the first logged command containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.contains(pattern))
    }

    fn issue(&self, command: &str) -> Result<()> {
        self.log.lock().unwrap().push(command.to_string());
        if self.failures.iter().any(|f| command.contains(f.as_str())) {
            return Err(Error::RemoteCommandFailed {
                command: command.to_string(),
                exit_info: "exit code 1".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteShell for FakeRemote {
    async fn stream(&self, command: &str) -> Result<()> {
        self.issue(command)
    }

    async fn capture(&self, command: &str) -> Result<String> {
        self.issue(command)?;
        Ok(self
            .captures
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }

    async fn upload(
        &self,
        job: &TransferJob,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<TransferReport> {
        self.issue(&format!("upload {}", job.remote_path()))?;
        self.uploads.lock().unwrap().push(Upload {
            local: job.local_path().to_path_buf(),
            remote: job.remote_path().to_string(),
            size: job.size(),
        });
        on_progress(TransferProgress {
            transferred: job.size(),
            total: job.size(),
            delta: job.size(),
        });
        Ok(TransferReport {
            bytes: job.size(),
            chunks: 1,
        })
    }
}
