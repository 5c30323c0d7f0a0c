//! Index arbiter: the serial agent that owns the segment list.
//!
//! Rollover, compaction, and key lookup all mutate or observe the list;
//! funnelling every observation through one queue keeps the single-writer
//! / many-readers shape without lock scaffolding around each field.
//! Readers block on the arbiter only long enough to receive a pointer
//! into an immutable segment file. The arbiter itself performs no disk
//! I/O; the compaction tasks it spawns do.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use seglog_core::metrics::Metrics;

use crate::compaction;
use crate::segment::Segment;

/// Segment-list length at which a rollover triggers compaction.
const COMPACTION_THRESHOLD: usize = 3;

pub(crate) enum IndexCmd {
    /// Record `key`'s newest location in the active segment. Sent by the
    /// writer after a successful append, before it replies to its caller,
    /// so a `get` issued after `put` returns always observes the write.
    Put { key: String, offset: u64 },
    /// Locate the newest occurrence of a key: walk the list newest-first,
    /// first segment whose index holds the key wins.
    Locate {
        key: String,
        reply: oneshot::Sender<Option<(Arc<Segment>, u64)>>,
    },
    /// A rollover produced a fresh active segment.
    Roll { segment: Arc<Segment> },
    /// A finished compaction replaces the named sealed segments.
    Swap {
        compacted: Arc<Segment>,
        replaced: Vec<PathBuf>,
        ack: oneshot::Sender<()>,
    },
    /// A compaction failed and was abandoned; its inputs stay in place.
    CompactionAborted,
    /// Snapshot of the list, oldest first.
    Segments {
        reply: oneshot::Sender<Vec<Arc<Segment>>>,
    },
    /// Exit once no compaction is in flight. Sent by `close` after the
    /// writer has stopped.
    Stop,
}

pub(crate) struct Arbiter {
    /// Ordered oldest-first; the last element is the active segment.
    segments: Vec<Arc<Segment>>,
    /// Handle back into our own queue, given to compaction tasks so the
    /// list swap is routed through this agent rather than assigned from
    /// outside it.
    self_tx: mpsc::Sender<IndexCmd>,
    /// At most one compaction task is alive at a time.
    compactor: Option<tokio::task::JoinHandle<()>>,
    metrics: Metrics,
}

impl Arbiter {
    pub(crate) fn new(
        segments: Vec<Arc<Segment>>,
        self_tx: mpsc::Sender<IndexCmd>,
        metrics: Metrics,
    ) -> Self {
        Self {
            segments,
            self_tx,
            compactor: None,
            metrics,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<IndexCmd>) {
        let mut stopping = false;
        while let Some(cmd) = rx.recv().await {
            match cmd {
                IndexCmd::Put { key, offset } => {
                    if let Some(active) = self.segments.last() {
                        active.put_index(key, offset);
                    }
                }
                IndexCmd::Locate { key, reply } => {
                    let hit = self
                        .segments
                        .iter()
                        .rev()
                        .find_map(|s| s.lookup(&key).map(|offset| (Arc::clone(s), offset)));
                    let _ = reply.send(hit);
                }
                IndexCmd::Roll { segment } => {
                    self.segments.push(segment);
                    if self.segments.len() >= COMPACTION_THRESHOLD {
                        self.spawn_compaction();
                    }
                }
                IndexCmd::Swap {
                    compacted,
                    replaced,
                    ack,
                } => {
                    self.segments
                        .retain(|s| !replaced.iter().any(|p| p == s.path()));
                    self.segments.insert(0, compacted);
                    info!(segments = self.segments.len(), "segment list swapped");
                    let _ = ack.send(());
                    if self.reap_compactor(stopping).await {
                        break;
                    }
                    // Rollovers during the merge may have grown the list
                    // past the threshold again.
                    if self.segments.len() >= COMPACTION_THRESHOLD {
                        self.spawn_compaction();
                    }
                }
                IndexCmd::CompactionAborted => {
                    if self.reap_compactor(stopping).await {
                        break;
                    }
                }
                IndexCmd::Segments { reply } => {
                    let _ = reply.send(self.segments.clone());
                }
                IndexCmd::Stop => {
                    if self.compactor.is_none() {
                        break;
                    }
                    // Let the in-flight compaction publish or abort first.
                    stopping = true;
                }
            }
        }
        debug!("index arbiter stopped");
    }

    /// Join the finished compaction task. Returns true when a pending
    /// stop can now take effect.
    async fn reap_compactor(&mut self, stopping: bool) -> bool {
        if let Some(handle) = self.compactor.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "compaction task failed");
            }
        }
        stopping
    }

    /// Kick off a background merge over every sealed segment. The task
    /// publishes its result back through our queue; a failure is
    /// abandoned and the inputs stay readable in place.
    fn spawn_compaction(&mut self) {
        if self.compactor.is_some() {
            return;
        }
        let sealed: Vec<Arc<Segment>> = self.segments[..self.segments.len() - 1].to_vec();
        let replaced: Vec<PathBuf> = sealed.iter().map(|s| s.path().to_path_buf()).collect();
        let tx = self.self_tx.clone();
        let metrics = self.metrics.clone();

        self.compactor = Some(tokio::spawn(async move {
            match compaction::compact(&sealed) {
                Ok(outcome) => {
                    metrics.record_compaction(outcome.records_kept);
                    let (ack_tx, ack_rx) = oneshot::channel();
                    let swap = IndexCmd::Swap {
                        compacted: outcome.segment,
                        replaced,
                        ack: ack_tx,
                    };
                    if tx.send(swap).await.is_ok() {
                        let _ = ack_rx.await;
                    }
                    // The oldest input's path now holds the merged file;
                    // the rest are superseded and no lookup returns them
                    // past the swap.
                    for path in &outcome.leftover {
                        if let Err(e) = std::fs::remove_file(path) {
                            warn!(
                                path = %path.display(),
                                error = %e,
                                "failed to remove superseded segment"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "compaction abandoned");
                    let _ = tx.send(IndexCmd::CompactionAborted).await;
                }
            }
        }));
    }
}
