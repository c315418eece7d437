use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::SyncError;

/// Where a synchronization pass currently is.
///
/// `Idle -> Fetching -> Parsing -> Persisting -> Done`, with
/// `Fetching -> Retrying -> Fetching` on transient faults.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Fetching {
        attempt: u32,
    },
    Retrying {
        attempt: u32,
        delay: Duration,
    },
    Parsing,
    Persisting,
    Done {
        succeeded: bool,
    },
}

impl SyncState {
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle | SyncState::Done { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Rows handed to the book, reciprocals included when it wants them.
    pub pairs_stored: usize,
    /// Fetch attempts made, counting the first.
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum SyncOutcome {
    Success(SyncReport),
    Failure(SyncError),
    /// Another pass was already in flight; nothing was done.
    AlreadyRunning,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success(_))
    }
}
