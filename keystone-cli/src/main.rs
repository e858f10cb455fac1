//! Keystone: assemble, inspect and run a component repository.
//!
//! # Usage
//!
//! ```text
//! keystone check [--config <path>] [--json]
//! keystone find <type> [classifier] [--config <path>]
//! keystone run [--config <path>]
//! ```
//!
//! Without `--config` the file is read from `~/.keystone/keystone.yaml`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, find::FindArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "keystone",
    version,
    about = "Assemble and run a registry of long-lived service components",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble the configured components without starting them and list what was published.
    Check(CheckArgs),

    /// Look up a published component type, optionally narrowed to one classifier.
    Find(FindArgs),

    /// Assemble, start and run until ctrl-c, then stop.
    Run(RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Check(args) => args.run(),
        Commands::Find(args) => args.run(),
        Commands::Run(args) => args.run(),
    }
}
