// ABOUTME: Rate-limited progress reporting for file transfers.
// ABOUTME: Coalesces chunk notifications so observers see at most one per interval.

use std::time::Duration;
use tokio::time::Instant;

/// Cumulative transfer progress delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes sent so far.
    pub transferred: u64,
    /// Size of the file being sent.
    pub total: u64,
    /// Bytes sent since the previous delivered report.
    pub delta: u64,
}

impl TransferProgress {
    pub fn is_complete(&self) -> bool {
        self.transferred >= self.total
    }
}

/// Decides which chunk boundaries are worth reporting.
///
/// The first chunk and the last chunk are always reported; anything in
/// between is dropped when it arrives sooner than `interval` after the
/// previous report. Dropped bytes are folded into the next report's `delta`.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
    reported: u64,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            reported: 0,
        }
    }

    /// Record a chunk boundary; returns the report to deliver, if any.
    pub fn observe(&mut self, transferred: u64, total: u64) -> Option<TransferProgress> {
        let now = Instant::now();
        let due = transferred >= total
            || self
                .last_emit
                .is_none_or(|last| now.duration_since(last) >= self.interval);

        if due { Some(self.emit(now, transferred, total)) } else { None }
    }

    /// Flush the final position if the last boundary was throttled away.
    pub fn finish(&mut self, transferred: u64, total: u64) -> Option<TransferProgress> {
        if self.last_emit.is_some() && self.reported == transferred {
            return None;
        }
        Some(self.emit(Instant::now(), transferred, total))
    }

    fn emit(&mut self, now: Instant, transferred: u64, total: u64) -> TransferProgress {
        let delta = transferred - self.reported;
        self.reported = transferred;
        self.last_emit = Some(now);
        TransferProgress {
            transferred,
            total,
            delta,
        }
    }
}
