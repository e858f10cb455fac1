use std::path::PathBuf;

use thiserror::Error;

use keystone_core::{BoxError, RepositoryError};

/// Error surface for configuration, assembly and the run loop.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse runtime config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("runtime config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("component #{position} names unknown factory '{name}'")]
    UnknownFactory { name: String, position: usize },

    #[error("factory '{factory}' failed for classifier '{classifier}': {source}")]
    Factory {
        factory: String,
        classifier: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid property '{key}' = '{value}': {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        reason: String,
    },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("signal handler failed: {0}")]
    Signal(#[source] std::io::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RuntimeError {
    RuntimeError::Io {
        path: path.into(),
        source,
    }
}
