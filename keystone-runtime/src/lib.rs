//! Configuration-driven assembly and run loop for a keystone component repository.

pub mod builtin;
pub mod config;
mod error;
pub mod factory;
pub mod paths;
mod runtime;

pub use builtin::{Heartbeat, HeartbeatFactory, MemoryCache, MemoryCacheFactory};
pub use config::{load_config, load_config_at, ComponentSpec, LoggingConfig, RuntimeConfig};
pub use error::RuntimeError;
pub use factory::{assemble, ComponentFactory, FactoryTable};
pub use runtime::{init_tracing, run, start_blocking};
