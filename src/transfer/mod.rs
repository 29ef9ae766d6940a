// ABOUTME: File-copy engine speaking the scp sink protocol over one remote channel.
// ABOUTME: Handshake, metadata frame, chunked payload and per-stage acknowledgements.

mod error;
mod job;
mod progress;
mod protocol;

pub use error::{Result, Stage, TransferError};
pub use job::TransferJob;
pub use progress::{ProgressThrottle, TransferProgress};
pub use protocol::{SinkChannel, TransferOptions, TransferReport, push, sink_command};
