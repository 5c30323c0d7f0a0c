//! # Configuration
//!
//! Configuration for the store engine and the HTTP services around it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Store engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the segment files.
    pub dir: PathBuf,
    /// Size cap for the active segment, in bytes. Checked before each
    /// append; a single record larger than the cap still lands in its own
    /// segment and overflows it.
    pub segment_size: u64,
    /// Capacity of the write and index command queues.
    pub queue_depth: usize,
}

impl StoreConfig {
    pub fn new(dir: impl Into<PathBuf>, segment_size: u64) -> Self {
        Self {
            dir: dir.into(),
            segment_size,
            ..Default::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
            segment_size: 4 * 1024 * 1024, // 4MB
            queue_depth: 256,
        }
    }
}

/// HTTP DB service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub store: StoreConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8083,
            store: StoreConfig::default(),
        }
    }
}

/// Load balancer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    pub port: u16,
    /// Backend base URLs, e.g. `http://server1:8080`.
    pub backends: Vec<String>,
    pub health_interval: Duration,
    pub health_timeout: Duration,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            backends: Vec::new(),
            health_interval: Duration::from_secs(10),
            health_timeout: Duration::from_secs(3),
        }
    }
}
