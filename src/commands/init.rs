// ABOUTME: Init command implementation.
// ABOUTME: Scaffolds tugboat.yml and a Dockerfile in the working directory.

use std::path::Path;
use tugboat::config::init_project;
use tugboat::error::Result;
use tugboat::output::Output;

pub fn init(dir: &Path, force: bool, output: Output) -> Result<()> {
    let scaffold = init_project(dir, force)?;

    for path in &scaffold.written {
        output.progress(&format!("Created {}", path.display()));
    }
    for path in &scaffold.skipped {
        output.progress(&format!("Kept existing {}", path.display()));
    }

    output.success("Project initialized; edit tugboat.yml before deploying");
    Ok(())
}
