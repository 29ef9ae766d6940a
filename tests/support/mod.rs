// ABOUTME: Test support utilities.
// ABOUTME: Scripted fakes for the remote, toolchain and sink, plus a real SSH server.

use std::sync::Once;

// Each test binary only uses some of these modules, so allow dead_code.
#[allow(dead_code)]
pub mod fake_remote;
#[allow(dead_code)]
pub mod fake_sink;
#[allow(dead_code)]
pub mod fake_toolchain;
#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod ssh_container;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("tugboat=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}
