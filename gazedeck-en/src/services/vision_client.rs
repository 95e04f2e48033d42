//! Vision service client
//!
//! Wraps the external face/gaze analysis backend. The service is treated as
//! an unreliable, opaque dependency: every call is classified into one of six
//! outcomes and the caller picks a fallback, so a vision problem can never
//! abort a batch.

use crate::config::OverlayFlags;
use base64::{engine::general_purpose, Engine};
use gazedeck_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Head pose angles in degrees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadPose {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Axis-aligned bounding box in pixel coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// A 2D point in pixel coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Facial landmark positions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Landmarks {
    pub nose: Option<Point>,
    pub chin: Option<Point>,
}

/// Eye openness and aspect ratio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeState {
    pub left_open: Option<bool>,
    pub right_open: Option<bool>,
    pub left_aspect_ratio: Option<f64>,
    pub right_aspect_ratio: Option<f64>,
}

/// Distance from camera
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Depth {
    pub distance_cm: Option<f64>,
}

/// Gaze direction estimate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Gaze {
    pub direction: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Grouped measurements returned by the vision service.
///
/// Every group is optional; the merger flattens whatever is present into
/// canonical parameter rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionMetrics {
    pub head_pose: Option<HeadPose>,
    pub face_box: Option<BoundingBox>,
    pub left_eye_box: Option<BoundingBox>,
    pub right_eye_box: Option<BoundingBox>,
    pub left_iris: Option<Point>,
    pub right_iris: Option<Point>,
    pub landmarks: Option<Landmarks>,
    pub eye_state: Option<EyeState>,
    pub depth: Option<Depth>,
    pub posture: Option<String>,
    pub gaze: Option<Gaze>,
}

/// Raw wire response from the vision service
#[derive(Debug, Clone, Deserialize)]
pub struct VisionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub face_detected: Option<bool>,
    #[serde(default)]
    pub image: Option<VisionImage>,
    #[serde(default)]
    pub metrics: Option<VisionMetrics>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Image payload within a response
#[derive(Debug, Clone, Deserialize)]
pub struct VisionImage {
    #[serde(default)]
    pub data: Option<String>,
}

/// Classified result of one vision call
#[derive(Debug, Clone)]
pub enum VisionOutcome {
    /// Face detected, enhanced image decoded
    Success {
        image: Vec<u8>,
        metrics: VisionMetrics,
    },
    /// Service answered but saw no face; not an error
    NoFaceDetected,
    /// Service claimed success without a usable image payload
    MalformedResponse,
    /// Service reported failure
    ExplicitFailure { error: Option<String> },
    /// Non-success HTTP status
    ServiceRejected { status: u16 },
    /// Network error or timeout
    TransportFailure { error: String },
}

impl VisionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            VisionOutcome::Success { .. } => "success",
            VisionOutcome::NoFaceDetected => "no_face_detected",
            VisionOutcome::MalformedResponse => "malformed_response",
            VisionOutcome::ExplicitFailure { .. } => "explicit_failure",
            VisionOutcome::ServiceRejected { .. } => "service_rejected",
            VisionOutcome::TransportFailure { .. } => "transport_failure",
        }
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    image: String,
    overlays: &'a OverlayFlags,
}

#[derive(Debug, Serialize)]
struct BatchFrame {
    set_number: u32,
    image: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeBatchRequest<'a> {
    frames: Vec<BatchFrame>,
    overlays: &'a OverlayFlags,
}

#[derive(Debug, Deserialize)]
struct AnalyzeBatchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    results: Vec<BatchResultItem>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchResultItem {
    set_number: u32,
    #[serde(flatten)]
    response: VisionResponse,
}

/// Vision service API client
pub struct VisionClient {
    http_client: reqwest::Client,
    base_url: String,
    overlays: OverlayFlags,
}

impl VisionClient {
    pub fn new(base_url: &str, timeout: Duration, overlays: OverlayFlags) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            overlays,
        })
    }

    /// Analyze one webcam frame.
    pub async fn analyze(&self, image_bytes: &[u8]) -> VisionOutcome {
        let request = AnalyzeRequest {
            image: general_purpose::STANDARD.encode(image_bytes),
            overlays: &self.overlays,
        };

        debug!(bytes = image_bytes.len(), "Sending frame to vision service");

        let response = match self
            .http_client
            .post(format!("{}/analyze", self.base_url))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return VisionOutcome::TransportFailure {
                    error: e.to_string(),
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            return VisionOutcome::ServiceRejected {
                status: status.as_u16(),
            };
        }

        match response.json::<VisionResponse>().await {
            Ok(parsed) => classify_response(parsed),
            Err(_) => VisionOutcome::MalformedResponse,
        }
    }

    /// Hand a whole batch of frames to the bulk endpoint.
    ///
    /// Returns one classified outcome per submitted frame. A failure of the
    /// bulk call itself is reported against every frame, so the caller's
    /// per-set fallback handling is identical to the per-frame path.
    pub async fn analyze_batch(&self, frames: &[(u32, Vec<u8>)]) -> Vec<(u32, VisionOutcome)> {
        let request = AnalyzeBatchRequest {
            frames: frames
                .iter()
                .map(|(set_number, bytes)| BatchFrame {
                    set_number: *set_number,
                    image: general_purpose::STANDARD.encode(bytes),
                })
                .collect(),
            overlays: &self.overlays,
        };

        debug!(frames = frames.len(), "Sending frame batch to vision service");

        let response = match self
            .http_client
            .post(format!("{}/analyze_batch", self.base_url))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let error = e.to_string();
                return frames
                    .iter()
                    .map(|(n, _)| {
                        (
                            *n,
                            VisionOutcome::TransportFailure {
                                error: error.clone(),
                            },
                        )
                    })
                    .collect();
            }
        };

        let status = response.status();
        if !status.is_success() {
            return frames
                .iter()
                .map(|(n, _)| {
                    (
                        *n,
                        VisionOutcome::ServiceRejected {
                            status: status.as_u16(),
                        },
                    )
                })
                .collect();
        }

        let parsed = match response.json::<AnalyzeBatchResponse>().await {
            Ok(parsed) => parsed,
            Err(_) => {
                return frames
                    .iter()
                    .map(|(n, _)| (*n, VisionOutcome::MalformedResponse))
                    .collect();
            }
        };

        if !parsed.success {
            return frames
                .iter()
                .map(|(n, _)| {
                    (
                        *n,
                        VisionOutcome::ExplicitFailure {
                            error: parsed.error.clone(),
                        },
                    )
                })
                .collect();
        }

        let mut by_set: HashMap<u32, VisionResponse> = parsed
            .results
            .into_iter()
            .map(|item| (item.set_number, item.response))
            .collect();

        frames
            .iter()
            .map(|(n, _)| {
                let outcome = by_set
                    .remove(n)
                    .map(classify_response)
                    // Frame submitted but missing from the response
                    .unwrap_or(VisionOutcome::MalformedResponse);
                (*n, outcome)
            })
            .collect()
    }
}

/// Classify a parsed wire response into an outcome.
fn classify_response(response: VisionResponse) -> VisionOutcome {
    if !response.success {
        return VisionOutcome::ExplicitFailure {
            error: response.error,
        };
    }

    // An absent face_detected flag is treated as "no face": the service never
    // omits it on a genuine detection.
    if !response.face_detected.unwrap_or(false) {
        return VisionOutcome::NoFaceDetected;
    }

    let data = match response.image.and_then(|image| image.data) {
        Some(data) => data,
        None => return VisionOutcome::MalformedResponse,
    };

    match general_purpose::STANDARD.decode(data.as_bytes()) {
        Ok(bytes) if !bytes.is_empty() => VisionOutcome::Success {
            image: bytes,
            metrics: response.metrics.unwrap_or_default(),
        },
        _ => VisionOutcome::MalformedResponse,
    }
}
