//! Parameter table merging
//!
//! Pure transformation combining a set's original parameter table with the
//! measurements of a fresh vision analysis. Capture-owned rows pass through
//! untouched; vision-owned rows are replaced when fresh metrics exist and
//! preserved verbatim when they don't.

use crate::fields::is_derived_field;
use crate::params::ParameterRecord;
use crate::services::vision_client::{BoundingBox, VisionMetrics};
use chrono::Utc;

/// What the vision service produced for this set.
#[derive(Debug, Clone, Copy)]
pub enum FreshMetrics<'a> {
    /// Face detected; these measurements replace vision-owned rows
    Detected(&'a VisionMetrics),
    /// Service answered without a face; the table notes it
    NoFace,
    /// Vision unavailable (transport failure, rejection, explicit failure)
    Unavailable,
}

/// Merge an optional original table with an optional fresh analysis.
///
/// The result always contains at least one row.
pub fn merge(original: Option<&ParameterRecord>, fresh: FreshMetrics) -> ParameterRecord {
    let mut merged = ParameterRecord::new();
    let fresh_detected = matches!(fresh, FreshMetrics::Detected(_));

    if let Some(original) = original {
        for (key, value) in original.iter() {
            if is_derived_field(key) {
                // Vision-owned rows survive only when no fresh analysis
                // replaces them.
                if !fresh_detected {
                    merged.set(key, value);
                }
            } else {
                merged.set(key, value);
            }
        }
    }

    match fresh {
        FreshMetrics::Detected(metrics) => {
            merged.set("face_detected", "true");
            flatten_metrics(metrics, &mut merged);
        }
        FreshMetrics::NoFace => {
            merged.set("face_detected", "false");
        }
        FreshMetrics::Unavailable => {}
    }

    if merged.is_empty() {
        placeholder(&mut merged);
    }

    merged
}

/// Minimal rows emitted when a set has neither original data nor metrics.
fn placeholder(record: &mut ParameterRecord) {
    record.set("face_detected", "false");
    record.set("timestamp", Utc::now().to_rfc3339());
    record.set("note", "no parameter data available for this capture set");
}

/// Flatten grouped measurements into canonical flat rows.
fn flatten_metrics(metrics: &VisionMetrics, out: &mut ParameterRecord) {
    if let Some(pose) = &metrics.head_pose {
        out.set("pitch", fmt(pose.pitch));
        out.set("yaw", fmt(pose.yaw));
        out.set("roll", fmt(pose.roll));
    }

    if let Some(face_box) = &metrics.face_box {
        flatten_box(face_box, "face", out);
    }
    if let Some(eye_box) = &metrics.left_eye_box {
        flatten_box(eye_box, "left_eye", out);
    }
    if let Some(eye_box) = &metrics.right_eye_box {
        flatten_box(eye_box, "right_eye", out);
    }

    if let Some(iris) = &metrics.left_iris {
        out.set("left_iris_x", fmt(iris.x));
        out.set("left_iris_y", fmt(iris.y));
    }
    if let Some(iris) = &metrics.right_iris {
        out.set("right_iris_x", fmt(iris.x));
        out.set("right_iris_y", fmt(iris.y));
    }

    if let Some(landmarks) = &metrics.landmarks {
        if let Some(nose) = &landmarks.nose {
            out.set("nose_x", fmt(nose.x));
            out.set("nose_y", fmt(nose.y));
        }
        if let Some(chin) = &landmarks.chin {
            out.set("chin_x", fmt(chin.x));
            out.set("chin_y", fmt(chin.y));
        }
    }

    if let Some(eyes) = &metrics.eye_state {
        if let Some(open) = eyes.left_open {
            out.set("left_eye_open", bool_str(open));
        }
        if let Some(open) = eyes.right_open {
            out.set("right_eye_open", bool_str(open));
        }
        if let Some(ratio) = eyes.left_aspect_ratio {
            out.set("left_eye_aspect_ratio", fmt(ratio));
        }
        if let Some(ratio) = eyes.right_aspect_ratio {
            out.set("right_eye_aspect_ratio", fmt(ratio));
        }
    }

    if let Some(depth) = &metrics.depth {
        if let Some(distance) = depth.distance_cm {
            out.set("distance_cm", fmt(distance));
        }
    }

    if let Some(posture) = &metrics.posture {
        out.set("posture", posture.clone());
    }

    if let Some(gaze) = &metrics.gaze {
        if let Some(direction) = &gaze.direction {
            out.set("gaze_direction", direction.clone());
        }
        if let Some(x) = gaze.x {
            out.set("gaze_x", fmt(x));
        }
        if let Some(y) = gaze.y {
            out.set("gaze_y", fmt(y));
        }
    }
}

/// Min/max corners plus derived width and height.
fn flatten_box(bounding_box: &BoundingBox, prefix: &str, out: &mut ParameterRecord) {
    out.set(format!("{}_x_min", prefix), fmt(bounding_box.x_min));
    out.set(format!("{}_y_min", prefix), fmt(bounding_box.y_min));
    out.set(format!("{}_x_max", prefix), fmt(bounding_box.x_max));
    out.set(format!("{}_y_max", prefix), fmt(bounding_box.y_max));
    out.set(format!("{}_width", prefix), fmt(bounding_box.width()));
    out.set(format!("{}_height", prefix), fmt(bounding_box.height()));
}

fn fmt(value: f64) -> String {
    format!("{}", value)
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::vision_client::{Gaze, HeadPose, Point};

    fn head_pose_metrics() -> VisionMetrics {
        VisionMetrics {
            head_pose: Some(HeadPose {
                pitch: 5.0,
                yaw: -3.0,
                roll: 1.0,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_head_pose_flattens_to_whole_number_rows() {
        let metrics = head_pose_metrics();
        let merged = merge(None, FreshMetrics::Detected(&metrics));

        assert_eq!(merged.get("pitch"), Some("5"));
        assert_eq!(merged.get("yaw"), Some("-3"));
        assert_eq!(merged.get("roll"), Some("1"));
        assert_eq!(merged.get("face_detected"), Some("true"));
    }

    #[test]
    fn test_custom_fields_pass_through() {
        let original = ParameterRecord::parse(
            "Parameter,Value\nparticipant_id,P07\npitch,99\nsession_note,afternoon run\n",
        );
        let metrics = head_pose_metrics();
        let merged = merge(Some(&original), FreshMetrics::Detected(&metrics));

        // Capture-owned rows untouched
        assert_eq!(merged.get("participant_id"), Some("P07"));
        assert_eq!(merged.get("session_note"), Some("afternoon run"));
        // Vision-owned row replaced, not duplicated
        assert_eq!(merged.get("pitch"), Some("5"));
    }

    #[test]
    fn test_no_face_preserves_original_derived_values() {
        let original =
            ParameterRecord::parse("Parameter,Value\npitch,2.5\ngaze_direction,left\nnote,x\n");
        let merged = merge(Some(&original), FreshMetrics::NoFace);

        // Stale measurements re-emitted rather than discarded
        assert_eq!(merged.get("pitch"), Some("2.5"));
        assert_eq!(merged.get("gaze_direction"), Some("left"));
        assert_eq!(merged.get("note"), Some("x"));
        // But the table notes that this analysis saw no face
        assert_eq!(merged.get("face_detected"), Some("false"));
    }

    #[test]
    fn test_unavailable_preserves_everything_verbatim() {
        let original = ParameterRecord::parse(
            "Parameter,Value\nface_detected,true\npitch,2.5\nparticipant_id,P07\n",
        );
        let merged = merge(Some(&original), FreshMetrics::Unavailable);
        assert_eq!(merged, original);
    }

    #[test]
    fn test_placeholder_when_nothing_exists() {
        let merged = merge(None, FreshMetrics::Unavailable);

        assert!(!merged.is_empty());
        assert_eq!(merged.get("face_detected"), Some("false"));
        assert!(merged.contains("timestamp"));
        assert!(merged.contains("note"));
    }

    #[test]
    fn test_placeholder_when_original_is_empty_table() {
        let original = ParameterRecord::parse("Parameter,Value\n");
        let merged = merge(Some(&original), FreshMetrics::NoFace);
        // The no-face note itself satisfies the at-least-one-row invariant
        assert_eq!(merged.get("face_detected"), Some("false"));
    }

    #[test]
    fn test_box_flattening_derives_dimensions() {
        let metrics = VisionMetrics {
            face_box: Some(BoundingBox {
                x_min: 100.0,
                y_min: 50.0,
                x_max: 300.0,
                y_max: 250.0,
            }),
            ..Default::default()
        };
        let merged = merge(None, FreshMetrics::Detected(&metrics));

        assert_eq!(merged.get("face_x_min"), Some("100"));
        assert_eq!(merged.get("face_y_max"), Some("250"));
        assert_eq!(merged.get("face_width"), Some("200"));
        assert_eq!(merged.get("face_height"), Some("200"));
    }

    #[test]
    fn test_gaze_and_iris_flattening() {
        let metrics = VisionMetrics {
            left_iris: Some(Point { x: 210.5, y: 180.25 }),
            gaze: Some(Gaze {
                direction: Some("upper_left".to_string()),
                x: Some(-0.4),
                y: Some(0.2),
            }),
            ..Default::default()
        };
        let merged = merge(None, FreshMetrics::Detected(&metrics));

        assert_eq!(merged.get("left_iris_x"), Some("210.5"));
        assert_eq!(merged.get("left_iris_y"), Some("180.25"));
        assert_eq!(merged.get("gaze_direction"), Some("upper_left"));
        assert_eq!(merged.get("gaze_x"), Some("-0.4"));
    }

    #[test]
    fn test_rendered_output_has_header_and_a_row() {
        let merged = merge(None, FreshMetrics::Unavailable);
        let rendered = merged.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines.len() >= 2);
        assert_eq!(lines[0], "Parameter,Value");
    }
}
