//! Rebuild state tracking.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Outcome history of rebuilds, reported on `/status`.
#[derive(Debug, Default)]
pub struct RebuildState {
    /// Generation of the published snapshot.
    generation: RwLock<u64>,
    /// When the last successful rebuild was published.
    last_success: RwLock<Option<DateTime<Utc>>>,
    /// The last error message, if the last rebuild failed.
    last_error: RwLock<Option<String>>,
    /// Number of consecutive failures.
    failure_count: RwLock<u32>,
}

impl RebuildState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the generation of the published snapshot.
    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }

    /// Returns when the last successful rebuild was published.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.read()
    }

    /// Records a published rebuild.
    pub fn record_success(&self, generation: u64, at: DateTime<Utc>) {
        let mut generation_lock = self.generation.write();
        let mut last_success = self.last_success.write();
        let mut last_error = self.last_error.write();
        let mut failure_count = self.failure_count.write();

        *generation_lock = generation;
        *last_success = Some(at);
        *last_error = None;
        *failure_count = 0;
    }

    /// Records a failed rebuild.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut last_error = self.last_error.write();
        let mut failure_count = self.failure_count.write();

        *last_error = Some(error.into());
        *failure_count += 1;
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the number of consecutive failures.
    pub fn failure_count(&self) -> u32 {
        *self.failure_count.read()
    }

    /// Returns true once a rebuild has been published.
    pub fn is_initialized(&self) -> bool {
        self.last_success.read().is_some()
    }

    /// Returns true if the last rebuild succeeded.
    pub fn is_healthy(&self) -> bool {
        self.is_initialized() && self.last_error.read().is_none()
    }
}
