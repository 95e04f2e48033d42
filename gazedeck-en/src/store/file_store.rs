//! File-backed job store
//!
//! The lock is a marker file created with `create_new`, which the filesystem
//! guarantees to be a check-and-create in one step. The progress record is a
//! JSON sidecar, written to a temp file and renamed so pollers never observe
//! a torn write. Both live in the enhanced-output directory they protect.

use super::JobStore;
use crate::models::ProgressRecord;
use chrono::{DateTime, Utc};
use gazedeck_common::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LOCK_FILE: &str = ".processing.lock";
pub const PROGRESS_FILE: &str = "enhance_progress.json";

/// Lock marker and progress record stored as files in the output directory.
#[derive(Debug)]
pub struct FileJobStore {
    lock_path: PathBuf,
    progress_path: PathBuf,
}

impl FileJobStore {
    pub fn new(enhanced_dir: &Path) -> Self {
        Self {
            lock_path: enhanced_dir.join(LOCK_FILE),
            progress_path: enhanced_dir.join(PROGRESS_FILE),
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }
}

impl JobStore for FileJobStore {
    fn try_acquire(&self) -> Result<bool> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
        {
            Ok(mut file) => {
                // Marker content is the acquisition time, for staleness checks.
                file.write_all(Utc::now().to_rfc3339().as_bytes())?;
                debug!(path = %self.lock_path.display(), "Processing lock acquired");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn release(&self) {
        match std::fs::remove_file(&self.lock_path) {
            Ok(()) => debug!(path = %self.lock_path.display(), "Processing lock released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.lock_path.display(),
                error = %e,
                "Failed to remove processing lock"
            ),
        }
    }

    fn is_locked(&self) -> bool {
        self.lock_path.exists()
    }

    fn lock_created_at(&self) -> Option<DateTime<Utc>> {
        let content = std::fs::read_to_string(&self.lock_path).ok()?;
        DateTime::parse_from_rfc3339(content.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    fn read_progress(&self) -> ProgressRecord {
        let content = match std::fs::read_to_string(&self.progress_path) {
            Ok(content) => content,
            Err(_) => return ProgressRecord::default(),
        };
        match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    path = %self.progress_path.display(),
                    error = %e,
                    "Progress record unparseable; treating as empty"
                );
                ProgressRecord::default()
            }
        }
    }

    fn write_progress(&self, record: &ProgressRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| gazedeck_common::Error::Internal(format!("Serialize progress: {}", e)))?;
        let tmp_path = self.progress_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.progress_path)?;
        Ok(())
    }
}
