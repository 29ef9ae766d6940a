// ABOUTME: Library root for tugboat - build, ship, and swap a container over SSH.
// ABOUTME: The binary in main.rs wires these modules to the command line.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod history;
pub mod output;
pub mod ssh;
pub mod toolchain;
pub mod transfer;
pub mod types;
