//! Shared sink for success records.
//!
//! Appended to from every execution slot concurrently, read once at flush
//! time. Order is append order and carries no meaning; duplicates are kept.

use crate::types::WorkItem;
use std::sync::{Arc, Mutex, MutexGuard};

/// Append-only, mutex-guarded collection of successful items
#[derive(Clone, Debug, Default)]
pub struct ResultAggregator {
    records: Arc<Mutex<Vec<WorkItem>>>,
}

impl ResultAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a success
    pub fn append(&self, item: WorkItem) {
        self.lock().push(item);
    }

    /// Number of records so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current records
    ///
    /// Slots that are still running may append after the snapshot is taken;
    /// those records are not part of it.
    pub fn snapshot(&self) -> Vec<WorkItem> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WorkItem>> {
        // A panicking slot never holds this lock across user code.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
