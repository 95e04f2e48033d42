//! Enhancement API handlers
//!
//! GET /enhance/status, POST /enhance/start
//!
//! The start handler is the admission gate: it validates the request, claims
//! the processing lock, seeds the progress record, and spawns the batch
//! driver as a tracked background task before returning. Callers observe the
//! running job by polling the status handler.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{EnhancementJob, JobHandle, ProgressRecord},
    services::BatchDriver,
    store::LockGuard,
    AppState,
};

/// POST /enhance/start request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartEnhanceRequest {
    #[serde(default)]
    pub set_numbers: Vec<i64>,
}

/// POST /enhance/start response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartEnhanceResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub total_sets: usize,
    pub started_at: DateTime<Utc>,
}

/// GET /enhance/status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceStatusResponse {
    pub is_processing: bool,
    pub capture_count: usize,
    pub enhance_count: usize,
    pub needs_processing: bool,
    pub progress: ProgressRecord,
}

/// GET /enhance/status
///
/// Poll the current job state and session counts.
pub async fn get_status(State(state): State<AppState>) -> Json<EnhanceStatusResponse> {
    let capture_count = state.layout.capture_count();
    let enhance_count = state.layout.enhanced_count();

    Json(EnhanceStatusResponse {
        is_processing: state.store.is_locked(),
        capture_count,
        enhance_count,
        needs_processing: capture_count > enhance_count,
        progress: state.store.read_progress(),
    })
}

/// POST /enhance/start
///
/// Admit a new enhancement batch. Returns immediately; the batch runs as a
/// detached background task. Rejects with 409 while another batch is active.
pub async fn start_enhance(
    State(state): State<AppState>,
    Json(request): Json<StartEnhanceRequest>,
) -> ApiResult<Json<StartEnhanceResponse>> {
    if request.set_numbers.is_empty() {
        return Err(ApiError::BadRequest(
            "setNumbers must be a non-empty list".to_string(),
        ));
    }
    let mut set_numbers = Vec::with_capacity(request.set_numbers.len());
    for &n in &request.set_numbers {
        if n <= 0 || n > i64::from(u32::MAX) {
            return Err(ApiError::BadRequest(format!("Invalid set number: {}", n)));
        }
        set_numbers.push(n as u32);
    }

    // Failures from here up to the spawn are request-level: nothing has been
    // handed to the background task yet.
    state
        .layout
        .ensure_directories()
        .map_err(|e| ApiError::Internal(format!("Cannot create output directory: {}", e)))?;

    let driver = BatchDriver::new(state.config.clone(), state.layout.clone(), state.store.clone())
        .map_err(|e| ApiError::Internal(format!("Cannot initialize batch driver: {}", e)))?;

    if state.store.is_locked() && !try_reap_orphan(&state).await {
        return Err(ApiError::Conflict(
            "Enhancement batch already running".to_string(),
        ));
    }

    if !state
        .store
        .try_acquire()
        .map_err(|e| ApiError::Internal(format!("Cannot create processing lock: {}", e)))?
    {
        return Err(ApiError::Conflict(
            "Enhancement batch already running".to_string(),
        ));
    }
    let guard = LockGuard::new(state.store.clone());

    let progress = match state.store.initialize_progress(set_numbers.len() as u32) {
        Ok(progress) => progress,
        Err(e) => {
            drop(guard);
            return Err(ApiError::Internal(format!(
                "Cannot initialize progress record: {}",
                e
            )));
        }
    };

    let job = EnhancementJob::new(set_numbers);
    let response = StartEnhanceResponse {
        success: true,
        job_id: job.job_id,
        total_sets: job.total_sets(),
        started_at: job.created_at,
    };

    info!(
        job_id = %job.job_id,
        total_sets = job.total_sets(),
        "Enhancement batch admitted"
    );

    let state_clone = state.clone();
    let job_id = job.job_id;
    let task = tokio::spawn(async move {
        if let Err(e) = driver.run(job, guard, progress).await {
            tracing::error!(job_id = %job_id, error = %e, "Enhancement batch failed");
            *state_clone.last_error.write().await = Some(e.to_string());
        }
    });

    *state.active_job.write().await = Some(JobHandle::new(job_id, task));

    Ok(Json(response))
}

/// Attempt to reap a lock left behind by a dead job.
///
/// A lock owned by a finished task in this process is always reaped. A lock
/// predating this process is reaped only once it exceeds the configured TTL;
/// without a TTL it never expires and must be cleared manually.
async fn try_reap_orphan(state: &AppState) -> bool {
    let active = state.active_job.read().await;

    if let Some(handle) = active.as_ref() {
        if handle.is_finished() {
            warn!(job_id = %handle.job_id, "Lock held by a finished task; reaping");
            state.store.release();
            return true;
        }
        return false;
    }

    let Some(ttl) = state.config.lock_ttl_seconds else {
        return false;
    };
    match state.store.lock_created_at() {
        Some(created) => {
            let age = Utc::now().signed_duration_since(created);
            if age >= chrono::Duration::seconds(ttl as i64) {
                warn!(
                    age_seconds = age.num_seconds(),
                    ttl_seconds = ttl,
                    "Stale processing lock exceeded TTL; reaping"
                );
                state.store.release();
                true
            } else {
                false
            }
        }
        // Marker without a readable timestamp: leave it for manual removal.
        None => false,
    }
}

/// Build enhancement routes
pub fn enhance_routes() -> Router<AppState> {
    Router::new()
        .route("/enhance/status", get(get_status))
        .route("/enhance/start", post(start_enhance))
}
