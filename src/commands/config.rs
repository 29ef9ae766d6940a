// ABOUTME: Config command implementation.
// ABOUTME: Prints the effective configuration with the SSH password masked.

use std::path::Path;
use tugboat::config::Config;
use tugboat::error::Result;

pub fn show_config(dir: &Path) -> Result<()> {
    let config = Config::discover(dir)?;
    print!("{}", config.to_redacted_yaml()?);
    Ok(())
}
