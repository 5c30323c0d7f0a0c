//! Write serializer: the single owner of the active file handle.
//!
//! All appends funnel through one queue, so no two ever race. Each
//! request is appended, its index update is enqueued to the arbiter, and
//! only then is the caller's reply sent. Per-request errors are surfaced
//! on the reply channel; the serializer itself keeps running.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use seglog_core::error::{Error, Result};
use seglog_core::metrics::Metrics;
use seglog_core::record::Record;

use crate::arbiter::IndexCmd;
use crate::segment::{segment_path, Segment};

pub(crate) struct WriteCmd {
    pub record: Record,
    pub reply: oneshot::Sender<Result<()>>,
}

pub(crate) struct Writer {
    file: File,
    dir: PathBuf,
    segment_size: u64,
    next_ordinal: Arc<AtomicU64>,
    index_tx: mpsc::Sender<IndexCmd>,
    metrics: Metrics,
}

impl Writer {
    pub(crate) fn new(
        file: File,
        dir: PathBuf,
        segment_size: u64,
        next_ordinal: Arc<AtomicU64>,
        index_tx: mpsc::Sender<IndexCmd>,
        metrics: Metrics,
    ) -> Self {
        Self {
            file,
            dir,
            segment_size,
            next_ordinal,
            index_tx,
            metrics,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::Receiver<WriteCmd>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = shutdown.changed() => {
                    // Writes accepted before the close still complete.
                    while let Ok(cmd) = rx.try_recv() {
                        self.handle(cmd).await;
                    }
                    break;
                }
            }
        }
        debug!("write serializer stopped");
    }

    async fn handle(&mut self, cmd: WriteCmd) {
        let result = self.append(&cmd.record).await;
        if let Err(ref e) = result {
            self.metrics.record_write_error();
            warn!(key = %cmd.record.key, error = %e, "append failed");
        }
        let _ = cmd.reply.send(result);
    }

    async fn append(&mut self, record: &Record) -> Result<()> {
        let encoded = record.encode();
        let len = encoded.len() as u64;

        // The cap is checked against the file's size before the append. A
        // fresh segment takes a record of any size: an oversized record
        // overflows the cap in its own segment.
        let size = self.file.metadata()?.len();
        let offset = if size > 0 && size + len > self.segment_size {
            self.roll().await?;
            0
        } else {
            size
        };

        self.file.write_all(&encoded)?;

        // Publish the offset captured before the append. Enqueued before
        // the caller's reply, so a subsequent get observes this write.
        self.index_tx
            .send(IndexCmd::Put {
                key: record.key.clone(),
                offset,
            })
            .await
            .map_err(|_| Error::Closed)?;

        if record.is_tombstone() {
            self.metrics.record_delete(len);
        } else {
            self.metrics.record_put(len);
        }
        Ok(())
    }

    /// Seal the current segment and open a fresh active one. The sealed
    /// segment keeps its index and stays in the list; its file handle is
    /// closed here, since reads open the file per request anyway.
    async fn roll(&mut self) -> Result<()> {
        let ordinal = self.next_ordinal.fetch_add(1, Ordering::SeqCst);
        let path = segment_path(&self.dir, ordinal);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.file = file;

        let segment = Arc::new(Segment::new(path.clone()));
        self.index_tx
            .send(IndexCmd::Roll { segment })
            .await
            .map_err(|_| Error::Closed)?;

        self.metrics.record_rollover();
        info!(segment = %path.display(), "rolled over to new active segment");
        Ok(())
    }
}
