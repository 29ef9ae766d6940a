// ABOUTME: russh channel adapter for the copy protocol engine.
// ABOUTME: Maps channel messages onto the SinkChannel byte interface.

use super::error::{Error, Result};
use crate::transfer::{self, SinkChannel, TransferError};
use async_trait::async_trait;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

/// A session channel running the scp sink program.
pub struct ChannelSink {
    channel: Channel<Msg>,
    exit_status: Option<u32>,
    closed: bool,
    last_stderr: Option<String>,
}

impl ChannelSink {
    pub fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel,
            exit_status: None,
            closed: false,
            last_stderr: None,
        }
    }

    /// Launch the sink program on the channel.
    pub async fn start(&mut self, command: &str) -> Result<()> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| Error::ChannelFailed(format!("failed to start sink: {}", e)))
    }

    /// Close the channel. Safe to call on any path, including after errors.
    pub async fn close(self) {
        if let Err(e) = self.channel.close().await {
            tracing::debug!("closing sink channel: {}", e);
        }
    }

    fn observe(&mut self, msg: Option<ChannelMsg>) -> Observed {
        match msg {
            Some(ChannelMsg::Data { data }) => Observed::Data(data.to_vec()),
            Some(ChannelMsg::ExtendedData { data, .. }) => {
                let text = String::from_utf8_lossy(&data);
                tracing::debug!(stderr = %text.trim_end(), "sink wrote to stderr");
                if let Some(line) = last_line(&text) {
                    self.last_stderr = Some(line);
                }
                Observed::Other
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                self.exit_status = Some(exit_status);
                Observed::Exited
            }
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                self.closed = true;
                Observed::Closed
            }
            Some(_) => Observed::Other,
        }
    }
}

enum Observed {
    Data(Vec<u8>),
    Exited,
    Closed,
    Other,
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn channel_error(e: russh::Error) -> TransferError {
    TransferError::Channel(e.to_string())
}

#[async_trait]
impl SinkChannel for ChannelSink {
    async fn send(&mut self, data: &[u8]) -> transfer::Result<()> {
        // Resolves once the peer's window has accepted every byte.
        self.channel.data(data).await.map_err(channel_error)
    }

    async fn close_input(&mut self) -> transfer::Result<()> {
        self.channel.eof().await.map_err(channel_error)
    }

    async fn recv(&mut self) -> transfer::Result<Option<Vec<u8>>> {
        if self.closed {
            return Ok(None);
        }
        loop {
            let msg = self.channel.wait().await;
            match self.observe(msg) {
                Observed::Data(data) => return Ok(Some(data)),
                Observed::Closed => return Ok(None),
                Observed::Exited | Observed::Other => {}
            }
        }
    }

    async fn exit_status(&mut self) -> transfer::Result<Option<u32>> {
        while self.exit_status.is_none() {
            let msg = self.channel.wait().await;
            if msg.is_none() || matches!(msg, Some(ChannelMsg::Close)) {
                break;
            }
            self.observe(msg);
        }
        Ok(self.exit_status)
    }

    fn last_diagnostic(&self) -> Option<String> {
        self.last_stderr.clone()
    }
}
