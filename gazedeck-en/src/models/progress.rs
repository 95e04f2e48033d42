//! Durable progress snapshot for one enhancement batch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pollable snapshot of one batch's execution state.
///
/// Persisted after every processed set and left on disk after completion for
/// later inspection. Field names match the on-disk JSON written by the
/// capture suite, so records survive across service versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressRecord {
    /// Set number most recently handled by the driver
    pub current_set: u32,

    /// Total sets in the admitted batch
    pub total_sets: u32,

    /// Set numbers handled so far, in submission order
    pub processed_sets: Vec<u32>,

    /// Batch start time
    pub start_time: DateTime<Utc>,

    /// Time of the most recent progress write
    pub last_update_time: DateTime<Utc>,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            current_set: 0,
            total_sets: 0,
            processed_sets: Vec::new(),
            start_time: DateTime::<Utc>::UNIX_EPOCH,
            last_update_time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl ProgressRecord {
    /// Fresh record for a newly admitted batch.
    pub fn started(total_sets: u32) -> Self {
        let now = Utc::now();
        Self {
            current_set: 0,
            total_sets,
            processed_sets: Vec::new(),
            start_time: now,
            last_update_time: now,
        }
    }

    pub fn processed_count(&self) -> usize {
        self.processed_sets.len()
    }
}
