//! Per-set processing
//!
//! One capture set in, two guaranteed artifacts out: whatever the vision
//! service does, after this module runs a set there is an enhanced webcam
//! image and a parameter table at the output paths. Screen images are copied
//! through untouched; they are never sent to the vision service.

use crate::layout::SessionLayout;
use crate::params::ParameterRecord;
use crate::services::parameter_merger::{merge, FreshMetrics};
use crate::services::vision_client::{VisionClient, VisionOutcome};
use gazedeck_common::Result;
use tracing::{info, warn};

/// How a set ended up being handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStatus {
    /// Vision succeeded; a new image was written
    Enhanced,
    /// Vision saw no face; original image copied through
    NoFace,
    /// Vision (or persistence) failed; original image copied through
    FallbackCopied,
    /// Webcam input absent; only the parameter artifact was written
    SkippedMissingInput,
}

/// Per-set unit of work
pub struct SetProcessor {
    layout: SessionLayout,
}

impl SetProcessor {
    pub fn new(layout: SessionLayout) -> Self {
        Self { layout }
    }

    /// Process one set end to end: read input, call the vision service,
    /// write both output artifacts.
    pub async fn process_set(&self, client: &VisionClient, set_number: u32) -> Result<SetStatus> {
        let webcam_path = self.layout.webcam_input(set_number);

        let original = match std::fs::read(&webcam_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    set_number,
                    path = %webcam_path.display(),
                    error = %e,
                    "Webcam image missing; skipping set"
                );
                return self.handle_missing_input(set_number);
            }
        };

        let outcome = client.analyze(&original).await;
        self.apply_outcome(set_number, &original, &outcome)
    }

    /// Read this set's webcam input for bulk submission, if it exists.
    pub fn read_webcam_input(&self, set_number: u32) -> Option<Vec<u8>> {
        std::fs::read(self.layout.webcam_input(set_number)).ok()
    }

    /// Handle a set with no webcam input. The set is skipped, not failed,
    /// but a parameter artifact is still guaranteed.
    pub fn handle_missing_input(&self, set_number: u32) -> Result<SetStatus> {
        self.copy_screen_if_present(set_number);
        self.write_parameter_artifact(set_number, FreshMetrics::Unavailable)?;
        Ok(SetStatus::SkippedMissingInput)
    }

    /// Materialize artifacts for a set given a classified vision outcome.
    ///
    /// Shared by both execution strategies, so the on-disk result of a set is
    /// identical however its outcome was obtained.
    pub fn apply_outcome(
        &self,
        set_number: u32,
        original_webcam: &[u8],
        outcome: &VisionOutcome,
    ) -> Result<SetStatus> {
        self.copy_screen_if_present(set_number);

        let webcam_out = self.layout.webcam_output(set_number);
        let (status, fresh) = match outcome {
            VisionOutcome::Success { image, metrics } => {
                match std::fs::write(&webcam_out, image) {
                    Ok(()) => {
                        info!(set_number, bytes = image.len(), "Enhanced image written");
                        (SetStatus::Enhanced, FreshMetrics::Detected(metrics))
                    }
                    Err(e) => {
                        warn!(
                            set_number,
                            error = %e,
                            "Failed to persist enhanced image; copying original"
                        );
                        std::fs::write(&webcam_out, original_webcam)?;
                        (SetStatus::FallbackCopied, FreshMetrics::Detected(metrics))
                    }
                }
            }
            VisionOutcome::NoFaceDetected | VisionOutcome::MalformedResponse => {
                info!(
                    set_number,
                    outcome = outcome.label(),
                    "No usable analysis; copying original image"
                );
                std::fs::write(&webcam_out, original_webcam)?;
                (SetStatus::NoFace, FreshMetrics::NoFace)
            }
            VisionOutcome::TransportFailure { .. }
            | VisionOutcome::ServiceRejected { .. }
            | VisionOutcome::ExplicitFailure { .. } => {
                warn!(
                    set_number,
                    outcome = outcome.label(),
                    "Vision call failed; copying original image"
                );
                std::fs::write(&webcam_out, original_webcam)?;
                (SetStatus::FallbackCopied, FreshMetrics::Unavailable)
            }
        };

        self.write_parameter_artifact(set_number, fresh)?;
        Ok(status)
    }

    /// Merge the set's original parameter table (if any) with the fresh
    /// analysis and write the output table.
    fn write_parameter_artifact(&self, set_number: u32, fresh: FreshMetrics<'_>) -> Result<()> {
        let original = self
            .layout
            .parameter_input(set_number)
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|text| ParameterRecord::parse(&text));

        let merged = merge(original.as_ref(), fresh);
        std::fs::write(self.layout.parameter_output(set_number), merged.render())?;
        Ok(())
    }

    fn copy_screen_if_present(&self, set_number: u32) {
        let source = self.layout.screen_input(set_number);
        if !source.exists() {
            return;
        }
        if let Err(e) = std::fs::copy(&source, self.layout.screen_output(set_number)) {
            warn!(set_number, error = %e, "Failed to copy screen image");
        }
    }
}
