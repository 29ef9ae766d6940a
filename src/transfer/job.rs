// ABOUTME: A single local-file-to-remote-path copy request.
// ABOUTME: Size and permission bits are captured once, before any bytes move.

use super::error::{Result, TransferError};
use std::path::{Path, PathBuf};

/// Permission bits used when the platform exposes none.
#[cfg(not(unix))]
const DEFAULT_MODE: u32 = 0o644;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    local_path: PathBuf,
    remote_path: String,
    size: u64,
    mode: u32,
}

impl TransferJob {
    /// Stat `local_path` and bind it to `remote_path`.
    pub async fn prepare(local_path: impl Into<PathBuf>, remote_path: impl Into<String>) -> Result<Self> {
        let local_path = local_path.into();
        let metadata = tokio::fs::metadata(&local_path)
            .await
            .map_err(|source| TransferError::LocalFile {
                path: local_path.clone(),
                source,
            })?;

        if !metadata.is_file() {
            return Err(TransferError::LocalFile {
                path: local_path,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        Ok(Self::with_metadata(
            local_path,
            remote_path,
            metadata.len(),
            permission_bits(&metadata),
        ))
    }

    /// Build a job from already known metadata.
    pub fn with_metadata(
        local_path: impl Into<PathBuf>,
        remote_path: impl Into<String>,
        size: u64,
        mode: u32,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            size,
            mode: mode & 0o7777,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Base name announced in the metadata frame.
    pub fn remote_file_name(&self) -> Result<&str> {
        self.remote_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TransferError::InvalidRemotePath(self.remote_path.clone()))
    }

    /// The `C<mode> <size> <name>\n` frame.
    pub fn metadata_frame(&self) -> Result<String> {
        Ok(format!(
            "C{:04o} {} {}\n",
            self.mode,
            self.size,
            self.remote_file_name()?
        ))
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn permission_bits(_metadata: &std::fs::Metadata) -> u32 {
    DEFAULT_MODE
}
