//! Start/stop orchestration over the recorded lifecycle sequence.
//!
//! Start is fail-fast without unwinding: the first failing entry aborts the
//! sequence, entries that already started are left running, and the
//! repository is `FAILED` for good. Stop runs at most once, visits every
//! entry in registration order and swallows per-entry failures.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::capability::Lifecycle;
use crate::error::{BoxError, RepositoryError, ShutdownError};
use crate::status::{Status, StatusCell};

/// Result of a [`stop`](LifecycleOrchestrator::stop) call.
#[derive(Debug)]
pub enum StopOutcome {
    /// This call ran the stop sequence.
    Stopped {
        attempted: usize,
        failures: Vec<ShutdownError>,
    },
    /// Another call already stopped (or is stopping), or the repository is
    /// `FAILED`. Nothing was invoked.
    Skipped { status: Status },
}

impl StopOutcome {
    /// True if this call ran the stop sequence.
    pub fn ran(&self) -> bool {
        matches!(self, StopOutcome::Stopped { .. })
    }

    pub fn failures(&self) -> &[ShutdownError] {
        match self {
            StopOutcome::Stopped { failures, .. } => failures,
            StopOutcome::Skipped { .. } => &[],
        }
    }
}

/// Owns the repository status and drives lifecycle entries.
#[derive(Debug)]
pub struct LifecycleOrchestrator {
    status: StatusCell,
}

impl Default for LifecycleOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleOrchestrator {
    pub fn new() -> Self {
        Self {
            status: StatusCell::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    /// `Ok` if the current status is `expected`.
    pub fn require(&self, expected: Status) -> Result<(), RepositoryError> {
        let actual = self.status.get();
        if actual == expected {
            Ok(())
        } else {
            Err(RepositoryError::InvalidState { expected, actual })
        }
    }

    /// Moves any live status to `FAILED`; returns the status before the call.
    pub fn poison(&self) -> Status {
        self.status.fail()
    }

    /// Starts every entry in order. Requires `CREATING`.
    ///
    /// If a stop claims the repository while entries are starting, the
    /// remaining entries are skipped and `InvalidState` is returned.
    pub fn start(&self, entries: &[Arc<dyn Lifecycle>]) -> Result<(), RepositoryError> {
        self.status
            .transition(Status::Creating, Status::Starting)
            .map_err(|actual| RepositoryError::InvalidState {
                expected: Status::Creating,
                actual,
            })?;
        tracing::info!(entries = entries.len(), "starting repository");

        for (position, entry) in entries.iter().enumerate() {
            // A concurrent stop may have claimed the repository; never start past it.
            self.require_starting(position)?;
            tracing::debug!(entry = %entry.label(), position, "starting lifecycle entry");
            if let Err(source) = entry.start() {
                let label = entry.label();
                let previous = self.status.fail();
                tracing::error!(
                    entry = %label,
                    position,
                    status = %previous,
                    error = %source,
                    "lifecycle start failed; repository is FAILED",
                );
                return Err(RepositoryError::StartupFailure {
                    entry: label,
                    position,
                    source,
                });
            }
        }

        self.status
            .transition(Status::Starting, Status::Running)
            .map_err(|actual| {
                tracing::warn!(status = %actual, "repository left STARTING before startup completed");
                RepositoryError::InvalidState {
                    expected: Status::Starting,
                    actual,
                }
            })?;
        tracing::info!("repository running");
        Ok(())
    }

    fn require_starting(&self, position: usize) -> Result<(), RepositoryError> {
        let actual = self.status.get();
        if actual == Status::Starting {
            return Ok(());
        }
        tracing::warn!(
            status = %actual,
            remaining_from = position,
            "startup interrupted; remaining lifecycle entries not started",
        );
        Err(RepositoryError::InvalidState {
            expected: Status::Starting,
            actual,
        })
    }

    /// Stops every entry in order, once. Safe to call from any number of
    /// threads; only the caller that claims `STOPPING` does any work.
    pub fn stop(&self, entries: &[Arc<dyn Lifecycle>]) -> StopOutcome {
        let previous = match self.status.begin_stop() {
            Ok(previous) => previous,
            Err(status) => {
                tracing::debug!(status = %status, "stop ignored");
                return StopOutcome::Skipped { status };
            }
        };
        tracing::info!(from = %previous, entries = entries.len(), "stopping repository");

        let mut failures = Vec::new();
        for entry in entries {
            if let Err(source) = stop_entry(entry.as_ref()) {
                let failure = ShutdownError {
                    entry: entry.label(),
                    source,
                };
                tracing::warn!(error = %failure, "lifecycle stop failed; continuing shutdown");
                failures.push(failure);
            }
        }

        self.status.finish_stop();
        tracing::info!(failures = failures.len(), "repository stopped");
        StopOutcome::Stopped {
            attempted: entries.len(),
            failures,
        }
    }
}

/// Calls `stop`, turning a panic into an ordinary error.
fn stop_entry(entry: &dyn Lifecycle) -> Result<(), BoxError> {
    match panic::catch_unwind(AssertUnwindSafe(|| entry.stop())) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            Err(format!("panicked: {message}").into())
        }
    }
}
