//! `keystone run`: start the repository in the foreground.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use keystone_core::StopOutcome;
use keystone_runtime::{start_blocking, FactoryTable};

use super::load;

/// Arguments for `keystone run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Runtime config file. Defaults to `~/.keystone/keystone.yaml`.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let config = load(self.config.as_deref())?;
        let outcome = start_blocking(&config, &FactoryTable::with_builtins())
            .with_context(|| format!("'{}' did not run cleanly", config.name))?;

        match outcome {
            StopOutcome::Stopped { attempted, failures } if failures.is_empty() => {
                println!("{} stopped {attempted} lifecycle entries", "■".green().bold());
            }
            StopOutcome::Stopped { attempted, failures } => {
                println!(
                    "{} stopped {attempted} lifecycle entries, {} failed:",
                    "■".yellow().bold(),
                    failures.len(),
                );
                for failure in failures {
                    println!("  {failure}");
                }
            }
            StopOutcome::Skipped { status } => {
                println!("{} nothing to stop ({status})", "■".bright_black().bold());
            }
        }
        Ok(())
    }
}
