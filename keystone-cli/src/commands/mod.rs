pub mod check;
pub mod find;
pub mod run;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use keystone_core::ComponentRepository;
use keystone_runtime::{assemble, load_config, load_config_at, FactoryTable, RuntimeConfig};

/// Explicit `--config` path, or the home-directory default.
pub(crate) fn load(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => load_config_at(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => load_config().context("failed to load ~/.keystone/keystone.yaml"),
    }
}

/// Load and assemble with the built-in factories. The repository is left in `CREATING`.
pub(crate) fn assemble_from(
    path: Option<&Path>,
) -> Result<(RuntimeConfig, Arc<ComponentRepository>)> {
    let config = load(path)?;
    let repo = assemble(&config, &FactoryTable::with_builtins())
        .with_context(|| format!("failed to assemble '{}'", config.name))?;
    Ok((config, repo))
}
