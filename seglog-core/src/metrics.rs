//! # Metrics
//!
//! Lightweight operation counters shared by the store's agents.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics collector
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    // Write path
    puts: AtomicU64,
    deletes: AtomicU64,
    bytes_written: AtomicU64,
    write_errors: AtomicU64,

    // Read path
    gets: AtomicU64,
    misses: AtomicU64,

    // Segment lifecycle
    rollovers: AtomicU64,
    compactions: AtomicU64,
    records_compacted: AtomicU64,
}

/// Point-in-time view of the counters, for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub puts: u64,
    pub deletes: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
    pub gets: u64,
    pub misses: u64,
    pub rollovers: u64,
    pub compactions: u64,
    pub records_compacted: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_put(&self, bytes: u64) {
        self.inner.puts.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_delete(&self, bytes: u64) {
        self.inner.deletes.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_write_error(&self) {
        self.inner.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get(&self, hit: bool) {
        self.inner.gets.fetch_add(1, Ordering::Relaxed);
        if !hit {
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rollover(&self) {
        self.inner.rollovers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compaction(&self, records_kept: u64) {
        self.inner.compactions.fetch_add(1, Ordering::Relaxed);
        self.inner
            .records_compacted
            .fetch_add(records_kept, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            puts: self.inner.puts.load(Ordering::Relaxed),
            deletes: self.inner.deletes.load(Ordering::Relaxed),
            bytes_written: self.inner.bytes_written.load(Ordering::Relaxed),
            write_errors: self.inner.write_errors.load(Ordering::Relaxed),
            gets: self.inner.gets.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            rollovers: self.inner.rollovers.load(Ordering::Relaxed),
            compactions: self.inner.compactions.load(Ordering::Relaxed),
            records_compacted: self.inner.records_compacted.load(Ordering::Relaxed),
        }
    }
}
