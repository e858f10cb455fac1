//! Component factories and configuration-driven assembly.

use std::sync::Arc;

use indexmap::IndexMap;

use keystone_core::{BoxError, ComponentRepository};

use crate::builtin::{HeartbeatFactory, MemoryCacheFactory};
use crate::config::{ComponentSpec, RuntimeConfig};
use crate::error::RuntimeError;

/// Creates instances for one [`ComponentSpec`] and registers them.
///
/// A factory may register any mix of components, infrastructure, helper
/// lifecycles and stop hooks.
pub trait ComponentFactory: Send + Sync {
    fn init(&self, repo: &ComponentRepository, spec: &ComponentSpec) -> Result<(), BoxError>;
}

/// Factories by name, as referenced from `components[].factory`.
#[derive(Default)]
pub struct FactoryTable {
    factories: IndexMap<String, Box<dyn ComponentFactory>>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the built-in `memory-cache` and `heartbeat` factories.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.insert(MemoryCacheFactory::NAME, MemoryCacheFactory);
        table.insert(HeartbeatFactory::NAME, HeartbeatFactory);
        table
    }

    /// Adds or replaces a factory.
    pub fn insert(&mut self, name: impl Into<String>, factory: impl ComponentFactory + 'static) {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ComponentFactory> {
        self.factories.get(name).map(|factory| &**factory)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Builds a repository by running each configured factory in order.
///
/// The repository is returned in `CREATING`; starting it is the caller's job.
pub fn assemble(
    config: &RuntimeConfig,
    factories: &FactoryTable,
) -> Result<Arc<ComponentRepository>, RuntimeError> {
    let repo = Arc::new(ComponentRepository::new());
    for (position, spec) in config.components.iter().enumerate() {
        let factory = factories
            .get(&spec.factory)
            .ok_or_else(|| RuntimeError::UnknownFactory {
                name: spec.factory.clone(),
                position,
            })?;
        tracing::debug!(factory = %spec.factory, classifier = %spec.classifier, "initialising component");
        factory
            .init(&repo, spec)
            .map_err(|source| RuntimeError::Factory {
                factory: spec.factory.clone(),
                classifier: spec.classifier.clone(),
                source,
            })?;
    }
    tracing::info!(
        components = config.components.len(),
        instances = repo.instances().len(),
        "repository assembled",
    );
    Ok(repo)
}
