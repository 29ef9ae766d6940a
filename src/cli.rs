// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands, their arguments, and global output flags.

use clap::{Parser, Subcommand};
use tugboat::output::OutputMode;

#[derive(Parser)]
#[command(name = "tugboat")]
#[command(about = "Build a container image, ship it over SSH, and swap it in")]
#[command(version)]
pub struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a tugboat.yml template (and a Dockerfile if missing)
    Init {
        /// Overwrite an existing tugboat.yml
        #[arg(short, long)]
        force: bool,
    },

    /// Build, transfer, and start the current revision
    Deploy,

    /// Restart a previously deployed version
    Rollback {
        /// Version to restore (see --list)
        #[arg(required_unless_present = "list")]
        version: Option<String>,

        /// List recorded versions instead of rolling back
        #[arg(short, long, conflicts_with = "version")]
        list: bool,
    },

    /// Show the effective configuration with secrets masked
    Config,
}
