//! Background merge of sealed segments.
//!
//! Compaction folds every sealed segment into a single new one, keeping
//! only the newest live value per key. Tombstones elide themselves and
//! every older version of their key. The merged file atomically replaces
//! the oldest input via `rename`, so a crash at any point leaves the store
//! recoverable: either the old inputs are all intact, or the merged file
//! has taken the oldest input's place and the remaining inputs only hold
//! newer-or-equal versions.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use seglog_core::error::{Error, Result};
use seglog_core::record::{Record, TOMBSTONE};

use crate::segment::Segment;

/// Name of the scratch file compaction writes into before the rename.
/// Recovery ignores it: only `current-data<N>` files are segments.
const SCRATCH_FILE: &str = "compact.tmp";

pub(crate) struct CompactionOutcome {
    /// The merged segment, living at the oldest input's path.
    pub segment: Arc<Segment>,
    /// Input files superseded by the merge, safe to unlink once the
    /// arbiter has swapped the segment list.
    pub leftover: Vec<PathBuf>,
    pub records_kept: u64,
}

/// Merge `inputs` (sealed segments, oldest first) into one segment.
///
/// Reads only immutable files and indexes, so it runs concurrently with
/// foreground appends to the active segment.
pub(crate) fn compact(inputs: &[Arc<Segment>]) -> Result<CompactionOutcome> {
    let oldest = inputs.first().ok_or_else(|| {
        Error::Internal("compaction requires at least one sealed segment".to_string())
    })?;
    let target = oldest.path().to_path_buf();
    let dir = target
        .parent()
        .ok_or_else(|| Error::Internal(format!("segment {} has no parent", target.display())))?;
    let scratch = dir.join(SCRATCH_FILE);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&scratch)?;
    let mut index = HashMap::new();
    let mut offset = 0u64;
    let mut kept = 0u64;

    for (i, segment) in inputs.iter().enumerate() {
        for (key, record_offset) in segment.entries() {
            // A newer sealed segment shadows this version.
            if inputs[i + 1..].iter().any(|s| s.contains(&key)) {
                continue;
            }
            let value = segment.read(record_offset)?;
            // A tombstone elides itself and every older version.
            if value == TOMBSTONE {
                continue;
            }
            let encoded = Record::new(key.as_str(), value).encode();
            file.write_all(&encoded)?;
            index.insert(key, offset);
            offset += encoded.len() as u64;
            kept += 1;
        }
    }

    file.sync_all()?;
    drop(file);
    std::fs::rename(&scratch, &target)?;

    debug!(
        inputs = inputs.len(),
        records = kept,
        bytes = offset,
        target = %target.display(),
        "compacted sealed segments"
    );

    Ok(CompactionOutcome {
        segment: Arc::new(Segment::with_index(target, index)),
        leftover: inputs[1..].iter().map(|s| s.path().to_path_buf()).collect(),
        records_kept: kept,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::segment_path;
    use std::fs::File;
    use tempfile::TempDir;

    fn seal_segment(dir: &std::path::Path, ordinal: u64, records: &[Record]) -> Arc<Segment> {
        let path = segment_path(dir, ordinal);
        let mut file = File::create(&path).unwrap();
        for record in records {
            file.write_all(&record.encode()).unwrap();
        }
        let segment = Segment::new(path);
        segment.recover().unwrap();
        Arc::new(segment)
    }

    #[test]
    fn merge_keeps_newest_and_drops_tombstones() {
        let dir = TempDir::new().unwrap();
        let s0 = seal_segment(
            dir.path(),
            0,
            &[
                Record::new("stale", "old"),
                Record::new("kept", "v1"),
                Record::new("gone", "x"),
            ],
        );
        let s1 = seal_segment(
            dir.path(),
            1,
            &[Record::new("stale", "new"), Record::tombstone("gone")],
        );

        let outcome = compact(&[s0.clone(), s1]).unwrap();
        assert_eq!(outcome.records_kept, 2);
        assert_eq!(outcome.segment.path(), s0.path());
        assert_eq!(
            outcome.leftover,
            vec![segment_path(dir.path(), 1)]
        );

        let read = |key: &str| {
            outcome
                .segment
                .lookup(key)
                .map(|off| outcome.segment.read(off).unwrap())
        };
        assert_eq!(read("stale").as_deref(), Some("new"));
        assert_eq!(read("kept").as_deref(), Some("v1"));
        assert_eq!(read("gone"), None);
    }

    #[test]
    fn merged_file_replaces_oldest_input() {
        let dir = TempDir::new().unwrap();
        let s0 = seal_segment(dir.path(), 0, &[Record::new("a", "1")]);
        let s1 = seal_segment(dir.path(), 1, &[Record::new("b", "2")]);

        let outcome = compact(&[s0, s1]).unwrap();
        let size = std::fs::metadata(outcome.segment.path()).unwrap().len();
        let expected: u64 = [Record::new("a", "1"), Record::new("b", "2")]
            .iter()
            .map(|r| r.encoded_len())
            .sum();
        assert_eq!(size, expected);
        assert!(!dir.path().join(SCRATCH_FILE).exists());
    }
}
