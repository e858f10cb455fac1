//! YAML runtime configuration.
//!
//! ```yaml
//! name: pricing-node
//! logging:
//!   filter: info
//!   json: false
//! components:
//!   - factory: memory-cache
//!     classifier: quotes
//!     properties:
//!       capacity: "512"
//! ```
//!
//! Components are assembled in file order, which is also startup order.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, RuntimeError};
use crate::paths::config_path;

fn default_name() -> String {
    "keystone".to_owned()
}

fn default_filter() -> String {
    "info".to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Host context name.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            logging: LoggingConfig::default(),
            components: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` overrides it.
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

/// One component to assemble: which factory, under which classifier, with
/// which properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub factory: String,
    #[serde(default)]
    pub classifier: String,
    #[serde(default)]
    pub properties: IndexMap<String, String>,
}

impl ComponentSpec {
    pub fn new(factory: impl Into<String>, classifier: impl Into<String>) -> Self {
        Self {
            factory: factory.into(),
            classifier: classifier.into(),
            properties: IndexMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Parses an optional property, falling back to `default` when absent.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, RuntimeError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.property(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| RuntimeError::InvalidProperty {
                key: key.to_owned(),
                value: raw.to_owned(),
                reason: e.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load a runtime config from an explicit path.
pub fn load_config_at(path: &Path) -> Result<RuntimeConfig, RuntimeError> {
    if !path.exists() {
        return Err(RuntimeError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| RuntimeError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `<home>/.keystone/keystone.yaml`.
pub fn load_home_config_at(home: &Path) -> Result<RuntimeConfig, RuntimeError> {
    load_config_at(&config_path(home))
}

/// `load_home_config_at` convenience wrapper using the user's home directory.
pub fn load_config() -> Result<RuntimeConfig, RuntimeError> {
    load_home_config_at(&home()?)
}

/// Default config location for the current user.
pub fn default_config_path() -> Result<PathBuf, RuntimeError> {
    Ok(config_path(&home()?))
}

fn home() -> Result<PathBuf, RuntimeError> {
    dirs::home_dir().ok_or(RuntimeError::HomeNotFound)
}
