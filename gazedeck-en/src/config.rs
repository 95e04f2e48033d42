//! Configuration for gazedeck-en
//!
//! Resolution order for every setting: environment variable, then the
//! per-service TOML file (`~/.config/gazedeck/gazedeck-en.toml`), then the
//! compiled default.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// How the batch driver talks to the vision service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// One vision call per capture set, issued by the driver itself.
    Local,
    /// One bulk call carrying every frame; the driver materializes results.
    RemoteBatch,
}

/// Overlay rendering flags forwarded to the vision service.
///
/// One deployment-level choice applied identically by both execution
/// strategies; never varied per call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayFlags {
    pub head_pose: bool,
    pub bounding_box: bool,
    pub mask: bool,
    pub parameters: bool,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// HTTP listen port
    pub port: u16,
    /// Base URL of the external vision service
    pub vision_base_url: String,
    /// Per-image vision request timeout
    pub vision_timeout_seconds: u64,
    /// Pause between consecutive sets within one batch
    pub inter_set_delay_ms: u64,
    /// Vision invocation strategy
    pub strategy: ExecutionStrategy,
    /// Age after which a leftover processing lock may be reaped at admission.
    /// Unset means a leftover lock never expires and must be cleared manually.
    pub lock_ttl_seconds: Option<u64>,
    /// Overlay flags for vision requests
    pub overlays: OverlayFlags,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            port: 5731,
            vision_base_url: "http://127.0.0.1:5600".to_string(),
            vision_timeout_seconds: 30,
            inter_set_delay_ms: 500,
            strategy: ExecutionStrategy::Local,
            lock_ttl_seconds: None,
            overlays: OverlayFlags::default(),
        }
    }
}

impl EnhanceConfig {
    /// Load configuration: TOML file (if present), then environment overrides.
    pub fn load() -> Self {
        let mut config = match gazedeck_common::config::service_config_file("gazedeck-en") {
            Ok(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str::<EnhanceConfig>(&content) {
                    Ok(config) => {
                        info!(path = %path.display(), "Configuration loaded from TOML");
                        config
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Invalid TOML config, using defaults");
                        EnhanceConfig::default()
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not read config file, using defaults");
                    EnhanceConfig::default()
                }
            },
            _ => EnhanceConfig::default(),
        };

        config.apply_env_overrides();
        config
    }

    /// Apply `GAZEDECK_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GAZEDECK_VISION_URL") {
            if !url.trim().is_empty() {
                self.vision_base_url = url;
            }
        }
        if let Ok(secs) = std::env::var("GAZEDECK_VISION_TIMEOUT_SECONDS") {
            match secs.parse::<u64>() {
                Ok(secs) if secs > 0 => self.vision_timeout_seconds = secs,
                _ => warn!(value = %secs, "Ignoring invalid GAZEDECK_VISION_TIMEOUT_SECONDS"),
            }
        }
        if let Ok(port) = std::env::var("GAZEDECK_EN_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid GAZEDECK_EN_PORT"),
            }
        }
        if let Ok(strategy) = std::env::var("GAZEDECK_STRATEGY") {
            match strategy.as_str() {
                "local" => self.strategy = ExecutionStrategy::Local,
                "remote_batch" => self.strategy = ExecutionStrategy::RemoteBatch,
                other => warn!(value = %other, "Ignoring unknown GAZEDECK_STRATEGY"),
            }
        }
    }

    pub fn vision_timeout(&self) -> Duration {
        Duration::from_secs(self.vision_timeout_seconds)
    }

    pub fn inter_set_delay(&self) -> Duration {
        Duration::from_millis(self.inter_set_delay_ms)
    }
}
