//! Batch driver
//!
//! Runs one admitted enhancement job: feeds each requested set through the
//! set processor strictly in submission order, persists progress after every
//! set, and paces itself between sets to bound load on the vision service and
//! local disk. A set that fails is logged and left behind with fallback
//! artifacts; the batch always runs to the end of the list.

use crate::config::{EnhanceConfig, ExecutionStrategy};
use crate::layout::SessionLayout;
use crate::models::{EnhancementJob, ProgressRecord};
use crate::services::set_processor::SetProcessor;
use crate::services::vision_client::{VisionClient, VisionOutcome};
use crate::store::{JobStore, LockGuard};
use gazedeck_common::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives one enhancement job to completion
pub struct BatchDriver {
    config: EnhanceConfig,
    store: Arc<dyn JobStore>,
    processor: SetProcessor,
    client: VisionClient,
}

impl BatchDriver {
    pub fn new(
        config: EnhanceConfig,
        layout: SessionLayout,
        store: Arc<dyn JobStore>,
    ) -> Result<Self> {
        let client = VisionClient::new(
            &config.vision_base_url,
            config.vision_timeout(),
            config.overlays,
        )?;

        Ok(Self {
            config,
            store,
            processor: SetProcessor::new(layout),
            client,
        })
    }

    /// Run an admitted job. `guard` holds the processing lock and releases it
    /// on every exit path of this call, including a panic of the owning task.
    pub async fn run(
        &self,
        job: EnhancementJob,
        guard: LockGuard,
        mut progress: ProgressRecord,
    ) -> anyhow::Result<()> {
        let _guard = guard;
        let started = std::time::Instant::now();

        info!(
            job_id = %job.job_id,
            total_sets = job.total_sets(),
            strategy = ?self.config.strategy,
            "Enhancement batch started"
        );

        match self.config.strategy {
            ExecutionStrategy::Local => self.run_local(&job, &mut progress).await,
            ExecutionStrategy::RemoteBatch => self.run_remote_batch(&job, &mut progress).await,
        }

        info!(
            job_id = %job.job_id,
            duration_seconds = started.elapsed().as_secs(),
            processed = progress.processed_count(),
            "Enhancement batch finished"
        );

        Ok(())
    }

    /// Local strategy: one vision call per set, issued by this driver.
    async fn run_local(&self, job: &EnhancementJob, progress: &mut ProgressRecord) {
        for (index, &set_number) in job.set_numbers.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.inter_set_delay()).await;
            }

            match self.processor.process_set(&self.client, set_number).await {
                Ok(status) => info!(set_number, status = ?status, "Set handled"),
                Err(e) => warn!(set_number, error = %e, "Set processing failed; batch continues"),
            }

            self.record_progress(progress, set_number);
        }
    }

    /// Remote-batch strategy: hand every available frame to the bulk endpoint
    /// up front, then materialize results set by set.
    async fn run_remote_batch(&self, job: &EnhancementJob, progress: &mut ProgressRecord) {
        let mut frames = Vec::new();
        for &set_number in &job.set_numbers {
            match self.processor.read_webcam_input(set_number) {
                Some(bytes) => frames.push((set_number, bytes)),
                None => {
                    warn!(set_number, "Webcam image missing; set will be skipped");
                }
            }
        }

        let mut outcomes: HashMap<u32, VisionOutcome> = if frames.is_empty() {
            HashMap::new()
        } else {
            self.client.analyze_batch(&frames).await.into_iter().collect()
        };
        let originals: HashMap<u32, Vec<u8>> = frames.into_iter().collect();

        for (index, &set_number) in job.set_numbers.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.inter_set_delay()).await;
            }

            let result = match originals.get(&set_number) {
                Some(original) => {
                    let outcome = outcomes
                        .remove(&set_number)
                        .unwrap_or(VisionOutcome::MalformedResponse);
                    self.processor.apply_outcome(set_number, original, &outcome)
                }
                None => self.processor.handle_missing_input(set_number),
            };

            match result {
                Ok(status) => info!(set_number, status = ?status, "Set handled"),
                Err(e) => warn!(set_number, error = %e, "Set processing failed; batch continues"),
            }

            self.record_progress(progress, set_number);
        }
    }

    /// Persist progress for a handled set. A progress write failure is not a
    /// reason to abandon the batch; the in-memory record stays authoritative.
    fn record_progress(&self, progress: &mut ProgressRecord, set_number: u32) {
        if let Err(e) = self.store.advance(progress, set_number) {
            warn!(set_number, error = %e, "Failed to persist progress advance");
        }
        if let Err(e) = self.store.mark_processed(progress, set_number) {
            warn!(set_number, error = %e, "Failed to persist processed set");
        }
    }
}
