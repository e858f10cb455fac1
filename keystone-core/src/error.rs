//! Error types for keystone-core.

use thiserror::Error;

use crate::identity::Identity;
use crate::status::Status;

/// Boxed error returned by component callbacks (`start`, `stop`, `release`).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors that can arise from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// An instance is already stored under this identity. The original stays.
    #[error("component already registered: {identity}")]
    DuplicateKey { identity: Identity },

    /// Nothing is stored (or published) under this identity, or a reverse
    /// lookup was given an instance that is not a published component.
    #[error("no component available: {component}")]
    UnknownComponent { component: String },

    /// No published component has this type.
    #[error("unknown component type: {name}")]
    UnknownType { name: String },

    /// The identity exists but holds an instance of a different type.
    #[error("component {identity} holds {actual}, not {requested}")]
    TypeMismatch {
        identity: Identity,
        requested: &'static str,
        actual: &'static str,
    },

    /// Operation attempted while the repository is in the wrong status.
    #[error("invalid repository status, expected {expected} but was {actual}")]
    InvalidState { expected: Status, actual: Status },

    /// The first lifecycle entry that failed to start. The repository is now `FAILED`.
    #[error("failed to start {entry} (lifecycle entry #{position}): {source}")]
    StartupFailure {
        entry: String,
        position: usize,
        #[source]
        source: BoxError,
    },

    /// `from_context` was called on a context the repository was never bound to.
    #[error("no repository bound to host context '{context}'")]
    NotBound { context: String },
}

/// A lifecycle entry that failed to stop.
///
/// Only ever logged and collected into a
/// [`StopOutcome`](crate::lifecycle::StopOutcome); never aborts the shutdown sequence.
#[derive(Debug, Error)]
#[error("failed to stop {entry}: {source}")]
pub struct ShutdownError {
    pub entry: String,
    #[source]
    pub source: BoxError,
}
