//! `keystone find <type> [classifier]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use super::assemble_from;

/// Arguments for `keystone find`. Names and classifiers ignore ASCII case.
#[derive(Args, Debug)]
pub struct FindArgs {
    /// Full or simple type name, e.g. `MemoryCache`.
    pub type_name: String,

    /// Narrow the result to one classifier.
    pub classifier: Option<String>,

    /// Runtime config file. Defaults to `~/.keystone/keystone.yaml`.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl FindArgs {
    pub fn run(self) -> Result<()> {
        let (_, repo) = assemble_from(self.config.as_deref())?;

        let json = match self.classifier.as_deref() {
            Some(classifier) => {
                let Some(descriptor) = repo.find_descriptor(&self.type_name, classifier) else {
                    bail!(
                        "no component '{}' with classifier '{}'",
                        self.type_name,
                        classifier
                    );
                };
                serde_json::to_string_pretty(&descriptor)
            }
            None => {
                let Some(index) = repo.find_type(&self.type_name) else {
                    bail!("no component type named '{}'", self.type_name);
                };
                serde_json::to_string_pretty(&index)
            }
        };
        println!("{}", json.context("failed to serialize descriptor JSON")?);
        Ok(())
    }
}
