//! # Relief Configuration
//!
//! Tunables for the request pipeline, persisted as JSON under the runtime
//! directory (`.relief/config.json`, or `$RELIEF_RUNTIME_PATH/config.json`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ReliefError;
use crate::models::ResourceDomain;

/// Configuration for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReliefConfig {
    /// Results at or below this confidence are never surfaced
    pub confidence_threshold: f32,
    /// Items listed per domain section
    pub max_items_per_section: usize,
    /// Lifetime of cached lookup results
    pub cache_ttl_secs: u64,
    /// Sessions idle longer than this are evicted by the janitor
    pub session_idle_secs: u64,
    /// Capacity of each per-agent loop channel
    pub bus_capacity: usize,
    /// Domains that get a worker registered
    pub enabled_domains: Vec<ResourceDomain>,
}

impl Default for ReliefConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            max_items_per_section: 3,
            cache_ttl_secs: 3600,
            session_idle_secs: 86_400,
            bus_capacity: 64,
            enabled_domains: ResourceDomain::all(),
        }
    }
}

impl ReliefConfig {
    /// Load from the runtime directory, falling back to defaults when absent
    pub async fn load() -> Result<Self, ReliefError> {
        Self::load_from(get_runtime_path().join("config.json")).await
    }

    /// Load from an explicit path
    pub async fn load_from(path: PathBuf) -> Result<Self, ReliefError> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content =
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| ReliefError::ConfigIo {
                    path: path.display().to_string(),
                    source,
                })?;

        serde_json::from_str(&content).map_err(|source| ReliefError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

/// Get the runtime directory path (.relief)
pub fn get_runtime_path() -> PathBuf {
    if let Ok(path) = std::env::var("RELIEF_RUNTIME_PATH") {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".relief")
}
