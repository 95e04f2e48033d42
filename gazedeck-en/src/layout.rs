//! On-disk layout of capture sessions
//!
//! The root folder holds two sibling trees: `captures/` with the raw
//! artifacts written by the capture UI, and `enhanced/` with everything this
//! service produces. Artifacts share an integer set number:
//!
//! ```text
//! captures/webcam_3.jpg      -> enhanced/webcam_enhance_3.jpg
//! captures/screen_3.jpg      -> enhanced/screen_enhance_3.jpg
//! captures/parameters_3.csv  -> enhanced/parameter_enhance_3.csv
//! ```

use gazedeck_common::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const CAPTURE_DIR: &str = "captures";
pub const ENHANCED_DIR: &str = "enhanced";

/// Path helpers for one session root.
#[derive(Debug, Clone)]
pub struct SessionLayout {
    capture_dir: PathBuf,
    enhanced_dir: PathBuf,
}

impl SessionLayout {
    pub fn new(root_folder: &Path) -> Self {
        Self {
            capture_dir: root_folder.join(CAPTURE_DIR),
            enhanced_dir: root_folder.join(ENHANCED_DIR),
        }
    }

    /// Create both directory trees if missing.
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.capture_dir)?;
        std::fs::create_dir_all(&self.enhanced_dir)?;
        Ok(())
    }

    pub fn capture_dir(&self) -> &Path {
        &self.capture_dir
    }

    pub fn enhanced_dir(&self) -> &Path {
        &self.enhanced_dir
    }

    pub fn webcam_input(&self, set_number: u32) -> PathBuf {
        self.capture_dir.join(format!("webcam_{}.jpg", set_number))
    }

    pub fn screen_input(&self, set_number: u32) -> PathBuf {
        self.capture_dir.join(format!("screen_{}.jpg", set_number))
    }

    /// Original parameter table, if one exists.
    ///
    /// Older capture clients wrote `parameter_{N}.csv` (singular); both
    /// spellings are accepted on read.
    pub fn parameter_input(&self, set_number: u32) -> Option<PathBuf> {
        let plural = self
            .capture_dir
            .join(format!("parameters_{}.csv", set_number));
        if plural.exists() {
            return Some(plural);
        }
        let singular = self
            .capture_dir
            .join(format!("parameter_{}.csv", set_number));
        if singular.exists() {
            return Some(singular);
        }
        None
    }

    pub fn webcam_output(&self, set_number: u32) -> PathBuf {
        self.enhanced_dir
            .join(format!("webcam_enhance_{}.jpg", set_number))
    }

    pub fn screen_output(&self, set_number: u32) -> PathBuf {
        self.enhanced_dir
            .join(format!("screen_enhance_{}.jpg", set_number))
    }

    pub fn parameter_output(&self, set_number: u32) -> PathBuf {
        self.enhanced_dir
            .join(format!("parameter_enhance_{}.csv", set_number))
    }

    /// Number of capture sets present (webcam frames under `captures/`).
    pub fn capture_count(&self) -> usize {
        count_numbered(&self.capture_dir, "webcam_", ".jpg")
    }

    /// Number of sets already enhanced (webcam frames under `enhanced/`).
    pub fn enhanced_count(&self) -> usize {
        count_numbered(&self.enhanced_dir, "webcam_enhance_", ".jpg")
    }
}

/// Count files named `{prefix}{N}{suffix}` with a numeric N directly in `dir`.
fn count_numbered(dir: &Path, prefix: &str, suffix: &str) -> usize {
    WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| set_number_of(name, prefix, suffix))
        })
        .count()
}

/// Extract N from `{prefix}{N}{suffix}`, if the name matches exactly.
fn set_number_of(file_name: &str, prefix: &str, suffix: &str) -> Option<u32> {
    file_name
        .strip_prefix(prefix)?
        .strip_suffix(suffix)?
        .parse()
        .ok()
}
