//! Enhancement job identity and supervision

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One admitted batch request: an ordered list of set numbers.
#[derive(Debug, Clone)]
pub struct EnhancementJob {
    /// Unique job identifier
    pub job_id: Uuid,

    /// Set numbers to enhance, processed strictly in this order
    pub set_numbers: Vec<u32>,

    /// Job creation time
    pub created_at: DateTime<Utc>,
}

impl EnhancementJob {
    pub fn new(set_numbers: Vec<u32>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            set_numbers,
            created_at: Utc::now(),
        }
    }

    pub fn total_sets(&self) -> usize {
        self.set_numbers.len()
    }
}

/// Supervisable handle for the one background enhancement task.
///
/// Held in shared state so admission can detect a job whose owning task has
/// died and reap the lock it left behind.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    task: tokio::task::JoinHandle<()>,
}

impl JobHandle {
    pub fn new(job_id: Uuid, task: tokio::task::JoinHandle<()>) -> Self {
        Self {
            job_id,
            started_at: Utc::now(),
            task,
        }
    }

    /// Whether the owning task has finished (completed, errored, or panicked).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
