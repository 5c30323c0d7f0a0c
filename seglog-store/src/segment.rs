//! One append-only log file plus its in-memory key→offset index.
//!
//! The index maps each key present in the segment to the byte offset of
//! that key's *latest* record within the file. Older occurrences stay on
//! disk as garbage until compaction drops them.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use seglog_core::error::{Error, Result};
use seglog_core::record::{read_value, Record};

/// Segment files are named `current-data<N>` inside the store directory.
pub const SEGMENT_PREFIX: &str = "current-data";

/// Path of the segment with the given ordinal.
pub fn segment_path(dir: &Path, ordinal: u64) -> PathBuf {
    dir.join(format!("{SEGMENT_PREFIX}{ordinal}"))
}

/// Ordinal encoded in a segment file name, if the name matches the layout.
pub fn parse_ordinal(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix(SEGMENT_PREFIX)?
        .parse()
        .ok()
}

#[derive(Debug)]
pub struct Segment {
    path: PathBuf,
    // Written only by the index arbiter (or the compactor before a segment
    // is published); read by lookups and by the compactor on sealed
    // segments, whose contents no longer change.
    index: RwLock<HashMap<String, u64>>,
}

impl Segment {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            index: RwLock::new(HashMap::new()),
        }
    }

    /// A segment whose index was built ahead of publication (compaction
    /// output).
    pub(crate) fn with_index(path: PathBuf, index: HashMap<String, u64>) -> Self {
        Self {
            path,
            index: RwLock::new(index),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upsert the key's newest offset.
    pub fn put_index(&self, key: String, offset: u64) {
        self.index.write().insert(key, offset);
    }

    pub fn lookup(&self, key: &str) -> Option<u64> {
        self.index.read().get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.read().contains_key(key)
    }

    /// Snapshot of the index, for compaction over sealed segments.
    pub fn entries(&self) -> Vec<(String, u64)> {
        self.index
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    pub fn key_count(&self) -> usize {
        self.index.read().len()
    }

    /// Read the value of the record starting at `offset`.
    ///
    /// Opens the file anew so any number of readers can run in parallel
    /// without contending with the writer's handle.
    pub fn read(&self, offset: u64) -> Result<String> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;
        read_value(&mut reader)
    }

    /// Read the whole record starting at `offset`, key included, so the
    /// caller can verify the offset still points at the key it looked up.
    pub fn read_record(&self, offset: u64) -> Result<Record> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;
        match Record::read_from(&mut reader)? {
            Some(record) => Ok(record),
            None => Err(Error::CorruptRecord(
                "unexpected end of segment at record offset".to_string(),
            )),
        }
    }

    /// Rebuild the index by scanning the file from offset zero.
    ///
    /// Returns the number of bytes consumed, which at a clean EOF equals
    /// the file size. Malformed trailing bytes surface as
    /// [`seglog_core::Error::CorruptRecord`].
    pub fn recover(&self) -> Result<u64> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut offset = 0u64;
        let mut index = self.index.write();
        while let Some(record) = Record::read_from(&mut reader)? {
            let len = record.encoded_len();
            index.insert(record.key, offset);
            offset += len;
        }
        Ok(offset)
    }
}
