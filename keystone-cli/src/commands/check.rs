//! `keystone check`: assemble without starting and report what was published.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use keystone_core::DescriptorIndex;

use super::assemble_from;

/// Arguments for `keystone check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Runtime config file. Defaults to `~/.keystone/keystone.yaml`.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct CheckReportJson<'a> {
    name: &'a str,
    status: String,
    instances: usize,
    types: &'a [DescriptorIndex],
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "type")]
    type_name: String,
    #[tabled(rename = "classifier")]
    classifier: String,
    #[tabled(rename = "attributes")]
    attributes: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let (config, repo) = assemble_from(self.config.as_deref())?;
        let types = repo.enumerate_types();

        if self.json {
            let payload = CheckReportJson {
                name: &config.name,
                status: repo.status().to_string(),
                instances: repo.instances().len(),
                types: &types,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize check JSON")?
            );
            return Ok(());
        }

        println!(
            "Keystone v{} | {} | {} types | {} instances",
            env!("CARGO_PKG_VERSION"),
            config.name.bold(),
            types.len(),
            repo.instances().len(),
        );
        if types.is_empty() {
            println!("No components published.");
            return Ok(());
        }

        let rows: Vec<ComponentRow> = types
            .iter()
            .flat_map(|index| index.descriptors())
            .map(|descriptor| ComponentRow {
                type_name: descriptor.type_tag().simple_name().to_owned(),
                classifier: display_classifier(descriptor.classifier()),
                attributes: serde_json::to_string(descriptor.attributes())
                    .unwrap_or_else(|_| "{}".to_owned()),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{} assembled, not started", "■".green().bold());
        Ok(())
    }
}

pub(crate) fn display_classifier(classifier: &str) -> String {
    if classifier.is_empty() {
        "<default>".to_owned()
    } else {
        classifier.to_owned()
    }
}
