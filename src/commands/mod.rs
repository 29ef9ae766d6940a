// ABOUTME: Command module aggregator for the tugboat CLI.
// ABOUTME: Re-exports init, deploy, rollback, and config command handlers.

mod config;
mod deploy;
mod init;
mod rollback;

pub use config::show_config;
pub use deploy::deploy;
pub use init::init;
pub use rollback::{list_versions, rollback};

use tugboat::diagnostics::{Diagnostics, Warning};
use tugboat::ssh::SshRemote;

/// Close the SSH connection if one was opened (non-fatal if it fails).
async fn disconnect(remote: SshRemote, diag: &mut Diagnostics) {
    if let Err(e) = remote.disconnect().await {
        diag.warn(Warning::ssh_disconnect(format!("SSH disconnect failed: {e}")));
    }
}
