//! # Seglog Core
//!
//! This crate provides the fundamental building blocks for seglog:
//! - Record codec (the on-disk unit of the segmented log)
//! - Error types
//! - Configuration
//! - Metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   seglog-core                   │
//! ├─────────────────────────────────────────────────┤
//! │  • record     - On-disk record codec            │
//! │  • traits     - Key/value contract              │
//! │  • error      - Error handling                  │
//! │  • config     - Store and service configuration │
//! │  • metrics    - Operation counters              │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod record;
pub mod traits;

// Re-export commonly used types
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use record::{Record, TOMBSTONE};
pub use traits::KeyValue;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
