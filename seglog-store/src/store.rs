//! Store façade: lifecycle, directory layout, and the public
//! `put`/`get`/`delete`/`close` contract.
//!
//! `open` rebuilds every segment's index by scanning its file, opens the
//! newest segment (or a fresh one) as active, and starts the two
//! background agents: the write serializer and the index arbiter.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use seglog_core::config::StoreConfig;
use seglog_core::error::{Error, Result};
use seglog_core::metrics::{Metrics, MetricsSnapshot};
use seglog_core::record::{Record, TOMBSTONE};
use seglog_core::traits::KeyValue;

use crate::arbiter::{Arbiter, IndexCmd};
use crate::segment::{parse_ordinal, segment_path, Segment};
use crate::writer::{WriteCmd, Writer};

/// Point-in-time view of the store, served by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub segments: usize,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug)]
pub struct Store {
    config: StoreConfig,
    write_tx: mpsc::Sender<WriteCmd>,
    index_tx: mpsc::Sender<IndexCmd>,
    metrics: Metrics,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
    arbiter_task: Mutex<Option<JoinHandle<()>>>,
}

impl Store {
    /// Open the store in `config.dir`, creating the directory layout if
    /// absent and recovering any existing segment files in ordinal order.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        if config.queue_depth == 0 {
            return Err(Error::Configuration(
                "queue_depth must be at least 1".to_string(),
            ));
        }
        std::fs::create_dir_all(&config.dir)?;

        let mut found: Vec<(u64, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&config.dir)? {
            let path = entry?.path();
            if let Some(ordinal) = parse_ordinal(&path) {
                found.push((ordinal, path));
            }
        }
        found.sort_by_key(|(ordinal, _)| *ordinal);

        let mut segments = Vec::with_capacity(found.len());
        for (_, path) in &found {
            let segment = Segment::new(path.clone());
            let size = segment.recover()?;
            debug!(
                segment = %path.display(),
                size,
                keys = segment.key_count(),
                "recovered segment"
            );
            segments.push(Arc::new(segment));
        }

        let next_ordinal = Arc::new(AtomicU64::new(
            found.last().map(|(ordinal, _)| ordinal + 1).unwrap_or(0),
        ));
        let active_path = match found.last() {
            Some((_, path)) => path.clone(),
            None => {
                let ordinal = next_ordinal.fetch_add(1, Ordering::SeqCst);
                let path = segment_path(&config.dir, ordinal);
                segments.push(Arc::new(Segment::new(path.clone())));
                path
            }
        };
        let active_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&active_path)?;

        let metrics = Metrics::new();
        let (write_tx, write_rx) = mpsc::channel(config.queue_depth);
        let (index_tx, index_rx) = mpsc::channel(config.queue_depth);
        let (shutdown, shutdown_rx) = watch::channel(false);

        info!(
            dir = %config.dir.display(),
            segments = segments.len(),
            active = %active_path.display(),
            "store opened"
        );

        let arbiter = Arbiter::new(segments, index_tx.clone(), metrics.clone());
        let arbiter_task = tokio::spawn(arbiter.run(index_rx));

        let writer = Writer::new(
            active_file,
            config.dir.clone(),
            config.segment_size,
            next_ordinal,
            index_tx.clone(),
            metrics.clone(),
        );
        let writer_task = tokio::spawn(writer.run(write_rx, shutdown_rx));

        Ok(Self {
            config,
            write_tx,
            index_tx,
            metrics,
            closed: AtomicBool::new(false),
            shutdown,
            writer_task: Mutex::new(Some(writer_task)),
            arbiter_task: Mutex::new(Some(arbiter_task)),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Append a key/value record. Durable once the OS write call returns.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        if value == TOMBSTONE {
            return Err(Error::ReservedValue(value.to_string()));
        }
        self.append(Record::new(key, value)).await
    }

    /// Append a tombstone for the key. Reads of the key return
    /// [`Error::NotFound`] afterwards; deleting an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.append(Record::tombstone(key)).await
    }

    /// Resolve the newest occurrence of the key and read its value.
    pub async fn get(&self, key: &str) -> Result<String> {
        self.ensure_open()?;

        let Some((segment, offset)) = self.locate(key).await? else {
            self.metrics.record_get(false);
            return Err(Error::NotFound);
        };

        // The record is immutable at this offset; the read runs in the
        // caller's task against its own file handle.
        let value = match Self::read_key_at(&segment, offset, key) {
            Ok(value) => value,
            Err(first_err) => {
                // A compaction can retire the located segment between the
                // lookup and the read; refresh the location once before
                // surfacing anything.
                match self.locate(key).await? {
                    Some((fresh, fresh_offset))
                        if !(Arc::ptr_eq(&fresh, &segment) && fresh_offset == offset) =>
                    {
                        Self::read_key_at(&fresh, fresh_offset, key)?
                    }
                    _ => return Err(first_err),
                }
            }
        };

        if value == TOMBSTONE {
            self.metrics.record_get(false);
            return Err(Error::NotFound);
        }
        self.metrics.record_get(true);
        Ok(value)
    }

    /// Stop the background agents and release the active file handle.
    /// In-flight writes drain first; `close` is idempotent.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.shutdown.send(true);

        let writer = self.writer_task.lock().take();
        if let Some(handle) = writer {
            if let Err(e) = handle.await {
                warn!(error = %e, "write serializer task failed");
            }
        }

        // The writer has stopped publishing; now the arbiter can drain.
        let _ = self.index_tx.send(IndexCmd::Stop).await;
        let arbiter = self.arbiter_task.lock().take();
        if let Some(handle) = arbiter {
            if let Err(e) = handle.await {
                warn!(error = %e, "index arbiter task failed");
            }
        }

        info!(dir = %self.config.dir.display(), "store closed");
        Ok(())
    }

    /// Snapshot of the segment list, oldest first.
    pub async fn segments(&self) -> Result<Vec<Arc<Segment>>> {
        let (reply, rx) = oneshot::channel();
        self.index_tx
            .send(IndexCmd::Segments { reply })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    pub async fn segment_count(&self) -> Result<usize> {
        Ok(self.segments().await?.len())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            segments: self.segment_count().await?,
            metrics: self.metrics.snapshot(),
        })
    }

    async fn locate(&self, key: &str) -> Result<Option<(Arc<Segment>, u64)>> {
        let (reply, rx) = oneshot::channel();
        self.index_tx
            .send(IndexCmd::Locate {
                key: key.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    fn read_key_at(segment: &Segment, offset: u64, key: &str) -> Result<String> {
        let record = segment.read_record(offset)?;
        if record.key != key {
            return Err(Error::CorruptRecord(format!(
                "record at offset {} holds key {:?}, expected {:?}",
                offset, record.key, key
            )));
        }
        Ok(record.value)
    }

    async fn append(&self, record: Record) -> Result<()> {
        self.ensure_open()?;
        let (reply, rx) = oneshot::channel();
        self.write_tx
            .send(WriteCmd { record, reply })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)?
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValue for Store {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        Store::put(self, key, value).await
    }

    async fn get(&self, key: &str) -> Result<String> {
        Store::get(self, key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Store::delete(self, key).await
    }

    async fn close(&self) -> Result<()> {
        Store::close(self).await
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        // Best effort: stop the background agents if close was never
        // called.
        let _ = self.shutdown.send(true);
    }
}
