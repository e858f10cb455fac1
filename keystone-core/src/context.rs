//! Host context handed to context-aware components once the hosting
//! environment exists.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Attribute key under which a bound repository stores itself.
pub const REPOSITORY_KEY: &str = "keystone.repository";

/// A named bag of shared, typed attributes.
pub struct HostContext {
    name: String,
    attributes: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl HostContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts or replaces an attribute.
    pub fn set_attribute<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: Arc<T>) {
        self.attributes.write().insert(key.into(), value);
    }

    /// Returns the attribute if present and of type `T`.
    pub fn attribute<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.attributes.read().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.read().contains_key(key)
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.attributes.read().keys().cloned().collect();
        keys.sort();
        f.debug_struct("HostContext")
            .field("name", &self.name)
            .field("attributes", &keys)
            .finish()
    }
}
