// ABOUTME: Scripted SinkChannel for driving the copy protocol without a network.
// ABOUTME: Replies become readable at fixed instants, so retries are testable with paused time.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tugboat::transfer::{Result, SinkChannel};

pub struct ScriptedSink {
    replies: VecDeque<(Instant, Vec<u8>)>,
    /// Keep the output open (instead of closing it) once replies run out.
    hang_when_empty: bool,
    exit: Option<u32>,
    stderr: Option<String>,
    /// Every `send` call, in order.
    pub writes: Vec<Vec<u8>>,
    pub input_closed: bool,
}

impl ScriptedSink {
    pub fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            hang_when_empty: false,
            exit: Some(0),
            stderr: None,
            writes: Vec::new(),
            input_closed: false,
        }
    }

    /// A sink that acknowledges handshake, metadata, and completion.
    pub fn accepting() -> Self {
        Self::new().reply(&[0]).reply(&[0]).reply(&[0])
    }

    pub fn reply(self, bytes: &[u8]) -> Self {
        self.reply_after(Duration::ZERO, bytes)
    }

    /// Make `bytes` readable `delay` after the sink was created.
    pub fn reply_after(mut self, delay: Duration, bytes: &[u8]) -> Self {
        self.replies.push_back((Instant::now() + delay, bytes.to_vec()));
        self
    }

    pub fn hang_when_empty(mut self) -> Self {
        self.hang_when_empty = true;
        self
    }

    pub fn exit_with(mut self, code: Option<u32>) -> Self {
        self.exit = code;
        self
    }

    /// Diagnostic the remote program printed on stderr.
    pub fn stderr(mut self, line: &str) -> Self {
        self.stderr = Some(line.to_string());
        self
    }

    /// Everything written, concatenated.
    pub fn received(&self) -> Vec<u8> {
        self.writes.concat()
    }

    /// Payload bytes: everything after the metadata frame.
    pub fn payload(&self) -> Vec<u8> {
        self.writes.iter().skip(1).flatten().copied().collect()
    }
}

#[async_trait]
impl SinkChannel for ScriptedSink {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.writes.push(data.to_vec());
        Ok(())
    }

    async fn close_input(&mut self) -> Result<()> {
        self.input_closed = true;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        let Some((ready_at, _)) = self.replies.front() else {
            if self.hang_when_empty {
                std::future::pending::<()>().await;
            }
            return Ok(None);
        };
        tokio::time::sleep_until(*ready_at).await;
        Ok(self.replies.pop_front().map(|(_, bytes)| bytes))
    }

    async fn exit_status(&mut self) -> Result<Option<u32>> {
        Ok(self.exit)
    }

    fn last_diagnostic(&self) -> Option<String> {
        self.stderr.clone()
    }
}
