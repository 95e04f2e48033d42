//! Canonical dictionary of vision-owned parameter keys
//!
//! A capture set's parameter table mixes rows owned by the capture session
//! (operator notes, session settings, calibration ids) with rows owned by the
//! vision service (everything derived from the webcam frame). The merger uses
//! this dictionary to decide what a fresh analysis may overwrite; every other
//! key passes through untouched.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Flat keys owned by the vision service.
///
/// Kept in one place so the merge logic and the metric flattening can never
/// disagree about ownership.
pub const DERIVED_FIELDS: &[&str] = &[
    // Detection state
    "face_detected",
    // Head pose angles (degrees)
    "pitch",
    "yaw",
    "roll",
    // Face bounding box and derived dimensions (pixels)
    "face_x_min",
    "face_y_min",
    "face_x_max",
    "face_y_max",
    "face_width",
    "face_height",
    // Eye bounding boxes
    "left_eye_x_min",
    "left_eye_y_min",
    "left_eye_x_max",
    "left_eye_y_max",
    "left_eye_width",
    "left_eye_height",
    "right_eye_x_min",
    "right_eye_y_min",
    "right_eye_x_max",
    "right_eye_y_max",
    "right_eye_width",
    "right_eye_height",
    // Iris centers
    "left_iris_x",
    "left_iris_y",
    "right_iris_x",
    "right_iris_y",
    // Landmark positions
    "nose_x",
    "nose_y",
    "chin_x",
    "chin_y",
    // Eye state and aspect ratio
    "left_eye_open",
    "right_eye_open",
    "left_eye_aspect_ratio",
    "right_eye_aspect_ratio",
    // Depth / distance from camera
    "distance_cm",
    // Posture classification
    "posture",
    // Gaze direction
    "gaze_direction",
    "gaze_x",
    "gaze_y",
];

static DERIVED_FIELD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| DERIVED_FIELDS.iter().copied().collect());

/// Whether a parameter key is owned by the vision service.
///
/// Case-insensitive: parameter tables come from flat text files written by
/// several tools and key casing is not reliable.
pub fn is_derived_field(key: &str) -> bool {
    let lowered = key.trim().to_ascii_lowercase();
    DERIVED_FIELD_SET.contains(lowered.as_str())
}
