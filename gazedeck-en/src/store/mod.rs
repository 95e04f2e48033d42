//! Durable job-control state
//!
//! One enhancement batch may be active system-wide. The marker enforcing
//! that, and the progress record pollers read, live behind the [`JobStore`]
//! trait so the single-writer assumption is a contract of the seam rather
//! than an accident of the file layout. The shipped implementation is
//! file-backed ([`FileJobStore`]); anything durable could sit behind it.

mod file_store;

pub use file_store::FileJobStore;

use crate::models::ProgressRecord;
use chrono::{DateTime, Utc};
use gazedeck_common::Result;
use std::sync::Arc;

/// Mutual-exclusion marker plus progress record for the one active job.
pub trait JobStore: Send + Sync {
    /// Create the processing marker iff absent. Atomic with respect to the
    /// existence check: of two concurrent callers, exactly one gets `true`.
    fn try_acquire(&self) -> Result<bool>;

    /// Remove the processing marker. Idempotent; never fails if absent.
    fn release(&self);

    /// Whether the processing marker currently exists.
    fn is_locked(&self) -> bool;

    /// Creation time of the current marker, if one exists and is readable.
    fn lock_created_at(&self) -> Option<DateTime<Utc>>;

    /// Current progress snapshot. A missing or unparseable record reads as a
    /// zeroed default; corrupt state never surfaces to the caller.
    fn read_progress(&self) -> ProgressRecord;

    /// Persist a progress snapshot, replacing any previous one.
    fn write_progress(&self, record: &ProgressRecord) -> Result<()>;

    /// Create and persist a fresh record for a newly admitted batch.
    fn initialize_progress(&self, total_sets: u32) -> Result<ProgressRecord> {
        let record = ProgressRecord::started(total_sets);
        self.write_progress(&record)?;
        Ok(record)
    }

    /// Record the set currently being handled and persist immediately.
    fn advance(&self, record: &mut ProgressRecord, set_number: u32) -> Result<()> {
        record.current_set = set_number;
        record.last_update_time = Utc::now();
        self.write_progress(record)
    }

    /// Append a handled set to the processed list and persist immediately.
    fn mark_processed(&self, record: &mut ProgressRecord, set_number: u32) -> Result<()> {
        record.processed_sets.push(set_number);
        record.last_update_time = Utc::now();
        self.write_progress(record)
    }
}

/// Releases the processing lock when dropped.
///
/// The batch driver holds one of these for its whole run, so the lock is
/// released on completion, on error, and on panic of the driver task alike.
pub struct LockGuard {
    store: Arc<dyn JobStore>,
}

impl LockGuard {
    /// Wrap an already-acquired lock.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.store.release();
    }
}
