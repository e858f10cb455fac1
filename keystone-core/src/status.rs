//! Repository status and its lock-free state machine.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Repository-wide status.
///
/// Transitions only move forward; `Failed` and `Stopped` are terminal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Creating = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
    Failed = 5,
}

impl Status {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Status::Creating,
            1 => Status::Starting,
            2 => Status::Running,
            3 => Status::Stopping,
            4 => Status::Stopped,
            _ => Status::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Stopped | Status::Failed)
    }

    /// States from which a stop sequence may begin.
    pub fn can_begin_stop(self) -> bool {
        matches!(self, Status::Creating | Status::Starting | Status::Running)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Creating => "CREATING",
            Status::Starting => "STARTING",
            Status::Running => "RUNNING",
            Status::Stopping => "STOPPING",
            Status::Stopped => "STOPPED",
            Status::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Atomic holder of a [`Status`]. Every transition is a compare-and-set.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Status::Creating as u8))
    }

    pub(crate) fn get(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from` → `to`; on failure returns the status actually observed.
    pub(crate) fn transition(&self, from: Status, to: Status) -> Result<(), Status> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(Status::from_u8)
    }

    /// Poisons the repository. `Stopping`, `Stopped` and `Failed` are left alone.
    /// Returns the status seen before the call.
    pub(crate) fn fail(&self) -> Status {
        loop {
            let current = self.get();
            if matches!(current, Status::Stopping | Status::Stopped | Status::Failed) {
                return current;
            }
            if self.transition(current, Status::Failed).is_ok() {
                return current;
            }
        }
    }

    /// Claims the single stop sequence. `Ok(previous)` for the one winning
    /// caller, `Err(current)` for everyone else.
    pub(crate) fn begin_stop(&self) -> Result<Status, Status> {
        let mut current = self.get();
        loop {
            if !current.can_begin_stop() {
                return Err(current);
            }
            // A concurrent start may move CREATING -> STARTING -> RUNNING under us.
            match self.transition(current, Status::Stopping) {
                Ok(()) => return Ok(current),
                Err(observed) => current = observed,
            }
        }
    }

    pub(crate) fn finish_stop(&self) {
        self.0.store(Status::Stopped as u8, Ordering::Release);
    }
}
