// ABOUTME: The copy-to-sink protocol state machine.
// ABOUTME: Generic over the channel so it runs against SSH or in-memory fakes.

use super::error::{Result, Stage, TransferError};
use super::job::TransferJob;
use super::progress::{ProgressThrottle, TransferProgress};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::AsyncReadExt;

/// Byte-level transport to a remote program started in sink mode.
#[async_trait]
pub trait SinkChannel: Send {
    /// Write `data` and flush it to the remote side.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Signal end of input to the remote program.
    async fn close_input(&mut self) -> Result<()>;

    /// Wait for the next block of remote output.
    ///
    /// Returns `Ok(None)` once the remote side has closed its output. Must be
    /// cancel-safe: the engine wraps calls in timeouts.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>>;

    /// Wait for the remote program to exit and return its status, if reported.
    async fn exit_status(&mut self) -> Result<Option<u32>>;

    /// Last diagnostic line the remote program printed outside the protocol.
    fn last_diagnostic(&self) -> Option<String> {
        None
    }
}

/// Remote command that receives a single file at `remote_path`.
pub fn sink_command(remote_path: &str) -> String {
    format!("scp -t {}", shell_escape::escape(remote_path.into()))
}

/// Tuning knobs for a transfer.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Payload bytes per write.
    pub chunk_size: usize,
    /// Attempts made for each acknowledgement before giving up.
    pub ack_attempts: u32,
    /// Wait for the first attempt; doubled on each retry.
    pub ack_base_delay: Duration,
    /// Minimum time between two progress reports.
    pub progress_interval: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            ack_attempts: 6,
            ack_base_delay: Duration::from_millis(500),
            progress_interval: Duration::from_millis(100),
        }
    }
}

/// What was put on the wire for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Payload bytes sent, excluding the end-of-data marker.
    pub bytes: u64,
    /// Number of payload writes.
    pub chunks: u64,
}

/// Push `job` through `channel`, which must already run the sink program.
///
/// Any failing stage aborts the transfer. Nothing is sent after a rejected
/// acknowledgement, and a partially written remote file is left in place.
pub async fn push<C>(
    channel: &mut C,
    job: &TransferJob,
    options: &TransferOptions,
    on_progress: &mut (dyn FnMut(TransferProgress) + Send),
) -> Result<TransferReport>
where
    C: SinkChannel + ?Sized,
{
    let frame = job.metadata_frame()?;
    let mut sink = Sink {
        channel,
        options,
        pending: VecDeque::new(),
    };

    sink.expect_ack(Stage::Handshake).await?;

    tracing::debug!(frame = frame.trim_end(), "sending metadata frame");
    sink.channel.send(frame.as_bytes()).await?;
    sink.expect_ack(Stage::Metadata).await?;

    let report = sink.send_payload(job, on_progress).await?;

    sink.channel.send(&[0]).await?;
    sink.channel.close_input().await?;
    sink.expect_ack(Stage::Completion).await?;

    match sink.channel.exit_status().await? {
        Some(0) | None => Ok(report),
        Some(code) => Err(TransferError::RemoteExit(code)),
    }
}

struct Sink<'a, C: SinkChannel + ?Sized> {
    channel: &'a mut C,
    options: &'a TransferOptions,
    pending: VecDeque<u8>,
}

impl<C: SinkChannel + ?Sized> Sink<'_, C> {
    async fn send_payload(
        &mut self,
        job: &TransferJob,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<TransferReport> {
        let local_error = |source| TransferError::LocalFile {
            path: job.local_path().to_path_buf(),
            source,
        };

        let file = tokio::fs::File::open(job.local_path())
            .await
            .map_err(local_error)?;
        // Bytes appended after the job was prepared are not part of it.
        let mut reader = file.take(job.size());
        let mut buf = vec![0u8; self.options.chunk_size.max(1)];
        let mut throttle = ProgressThrottle::new(self.options.progress_interval);
        let mut report = TransferReport { bytes: 0, chunks: 0 };

        loop {
            let n = reader.read(&mut buf).await.map_err(local_error)?;
            if n == 0 {
                break;
            }
            self.channel.send(&buf[..n]).await?;
            report.bytes += n as u64;
            report.chunks += 1;
            if let Some(progress) = throttle.observe(report.bytes, job.size()) {
                on_progress(progress);
            }
        }

        if report.bytes != job.size() {
            return Err(TransferError::SourceChanged {
                path: job.local_path().to_path_buf(),
                expected: job.size(),
                actual: report.bytes,
            });
        }

        if let Some(progress) = throttle.finish(report.bytes, job.size()) {
            on_progress(progress);
        }

        Ok(report)
    }

    /// Read one status byte: 0 is success, 1 and 2 carry an error line.
    async fn expect_ack(&mut self, stage: Stage) -> Result<()> {
        match self.next_byte(stage).await? {
            0 => {
                tracing::debug!(%stage, "acknowledged");
                Ok(())
            }
            code @ (1 | 2) => {
                let message = self.read_line(stage).await?;
                Err(TransferError::Rejected {
                    stage,
                    fatal: code == 2,
                    message,
                })
            }
            byte => Err(TransferError::UnexpectedAck { stage, byte }),
        }
    }

    async fn read_line(&mut self, stage: Stage) -> Result<String> {
        let mut line = Vec::new();
        loop {
            match self.next_byte(stage).await {
                Ok(b'\n') => break,
                Ok(byte) => line.push(byte),
                // A truncated message is still worth reporting.
                Err(TransferError::UnexpectedEof { .. }) if !line.is_empty() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }

    async fn next_byte(&mut self, stage: Stage) -> Result<u8> {
        let mut attempt = 0;
        let mut waited = Duration::ZERO;

        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(byte);
            }

            let wait = self.options.ack_base_delay * 2u32.saturating_pow(attempt);
            match tokio::time::timeout(wait, self.channel.recv()).await {
                Ok(Ok(Some(data))) => self.pending.extend(data),
                Ok(Ok(None)) => {
                    return Err(TransferError::UnexpectedEof {
                        stage,
                        detail: self.channel.last_diagnostic(),
                    });
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    attempt += 1;
                    waited += wait;
                    if attempt >= self.options.ack_attempts {
                        return Err(TransferError::AckTimeout {
                            stage,
                            attempts: attempt,
                            waited,
                        });
                    }
                    tracing::debug!(%stage, attempt, "no acknowledgement yet, retrying");
                }
            }
        }
    }
}
