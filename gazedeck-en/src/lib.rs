//! gazedeck-en library interface
//!
//! Exposes the enhancement orchestrator's public APIs for the binary and for
//! integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod fields;
pub mod layout;
pub mod models;
pub mod params;
pub mod services;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::EnhanceConfig;
use crate::layout::SessionLayout;
use crate::models::JobHandle;
use crate::store::{FileJobStore, JobStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Service configuration
    pub config: EnhanceConfig,
    /// Session directory layout
    pub layout: SessionLayout,
    /// Lock and progress persistence
    pub store: Arc<dyn JobStore>,
    /// Handle for the one background enhancement task, if any
    pub active_job: Arc<RwLock<Option<JobHandle>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// State backed by the standard file store in the enhanced directory.
    pub fn new(config: EnhanceConfig, layout: SessionLayout) -> Self {
        let store: Arc<dyn JobStore> = Arc::new(FileJobStore::new(layout.enhanced_dir()));
        Self::with_store(config, layout, store)
    }

    /// State with an injected job store.
    pub fn with_store(
        config: EnhanceConfig,
        layout: SessionLayout,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            config,
            layout,
            store,
            active_job: Arc::new(RwLock::new(None)),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::enhance_routes())
        .merge(api::health_routes())
        .with_state(state)
}
