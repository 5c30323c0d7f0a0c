//! # Record Codec
//!
//! A record is the self-delimited on-disk unit of the segmented log. The
//! wire form is fixed, little-endian, and carries its own total size so a
//! scanner can walk a segment file without any out-of-band framing:
//!
//! ```text
//! ┌──────────────┬─────────────┬───────────┬───────────────┬─────────────┐
//! │ u32 total    │ u32 key_len │ key bytes │ u32 value_len │ value bytes │
//! └──────────────┴─────────────┴───────────┴───────────────┴─────────────┘
//! ```
//!
//! `total` counts the whole record including the `total` field itself.
//! Records are immutable once written; stale versions of a key become
//! garbage that compaction eventually drops.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Reserved value marking a logical deletion. A read that resolves to this
/// sentinel surfaces as [`Error::NotFound`].
pub const TOMBSTONE: &str = "DELETE";

/// Fixed bytes per record on top of the key and value payloads
/// (three u32 length fields).
pub const RECORD_OVERHEAD: u64 = 12;

/// One key/value pair as it appears in a segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: String,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A deletion record for `key`.
    pub fn tombstone(key: impl Into<String>) -> Self {
        Self::new(key, TOMBSTONE)
    }

    pub fn is_tombstone(&self) -> bool {
        self.value == TOMBSTONE
    }

    /// Exact encoded size in bytes.
    pub fn encoded_len(&self) -> u64 {
        RECORD_OVERHEAD + self.key.len() as u64 + self.value.len() as u64
    }

    /// Serialize into the on-disk frame. Deterministic:
    /// `decode(encode(r)) == r` for any record whose key and value lengths
    /// fit in the u32 size fields.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        buf.extend_from_slice(&(self.encoded_len() as u32).to_le_bytes());
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.key.as_bytes());
        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.value.as_bytes());
        buf
    }

    /// Parse one record from a buffer holding exactly its encoded frame.
    pub fn decode(buf: &[u8]) -> Result<Record> {
        let mut cursor = buf;

        let total = cursor.read_u32::<LittleEndian>().map_err(|_| short())? as u64;
        if total < RECORD_OVERHEAD || total != buf.len() as u64 {
            return Err(Error::CorruptRecord(format!(
                "declared size {} does not match frame of {} bytes",
                total,
                buf.len()
            )));
        }

        let key = read_segment_string(&mut cursor)?;
        let value = read_segment_string(&mut cursor)?;

        let record = Record { key, value };
        if record.encoded_len() != total {
            return Err(Error::CorruptRecord(format!(
                "lengths add up to {} but record declared {}",
                record.encoded_len(),
                total
            )));
        }
        Ok(record)
    }

    /// Read one record starting at the reader's current position.
    ///
    /// A clean EOF at a record boundary returns `Ok(None)`; EOF anywhere
    /// inside a record is a [`Error::CorruptRecord`]. This is the recovery
    /// scanner's workhorse.
    pub fn read_from(reader: &mut impl Read) -> Result<Option<Record>> {
        // The size prefix is read byte-wise: EOF before the first byte is
        // a record boundary, EOF inside the prefix is a torn record.
        let mut prefix = [0u8; 4];
        let filled = read_fully(reader, &mut prefix)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < prefix.len() {
            return Err(short());
        }
        let total = u32::from_le_bytes(prefix) as u64;
        if total < RECORD_OVERHEAD {
            return Err(Error::CorruptRecord(format!(
                "declared size {} below minimum frame",
                total
            )));
        }

        let mut rest = vec![0u8; (total - 4) as usize];
        reader.read_exact(&mut rest).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => short(),
            _ => Error::from(e),
        })?;

        let mut cursor = rest.as_slice();
        let key = read_segment_string(&mut cursor)?;
        let value = read_segment_string(&mut cursor)?;

        let record = Record { key, value };
        if record.encoded_len() != total {
            return Err(Error::CorruptRecord(format!(
                "lengths add up to {} but record declared {}",
                record.encoded_len(),
                total
            )));
        }
        Ok(Some(record))
    }
}

/// Consume exactly one record at the reader's current position and return
/// only its value. Point reads use this: the index already knows the key.
pub fn read_value(reader: &mut impl Read) -> Result<String> {
    match Record::read_from(reader)? {
        Some(record) => Ok(record.value),
        None => Err(Error::CorruptRecord(
            "unexpected end of segment at record offset".to_string(),
        )),
    }
}

fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

fn read_segment_string(cursor: &mut &[u8]) -> Result<String> {
    let len = cursor.read_u32::<LittleEndian>().map_err(|_| short())? as usize;
    if cursor.len() < len {
        return Err(short());
    }
    let (bytes, rest) = cursor.split_at(len);
    *cursor = rest;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::CorruptRecord(format!("invalid utf-8 in record: {}", e)))
}

fn short() -> Error {
    Error::CorruptRecord("record truncated".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    #[test]
    fn encode_round_trip() {
        let record = Record::new("tK", "tV");
        let data = record.encode();
        assert_eq!(record.encoded_len(), 16);
        assert_eq!(data.len() as u64, record.encoded_len());

        let decoded = Record::decode(&data).unwrap();
        assert_eq!(decoded.key, "tK");
        assert_eq!(decoded.value, "tV");
    }

    #[test]
    fn round_trip_empty_and_long() {
        let long = "y".repeat(10_000);
        for (key, value) in [
            ("", ""),
            ("k", ""),
            ("", "v"),
            ("key-with-unicode-ключ", "значення"),
            ("x", long.as_str()),
        ] {
            let record = Record::new(key, value);
            let decoded = Record::decode(&record.encode()).unwrap();
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn read_value_consumes_one_record() {
        let data = Record::new("tK", "tV").encode();
        let mut reader = BufReader::new(data.as_slice());
        assert_eq!(read_value(&mut reader).unwrap(), "tV");
    }

    #[test]
    fn read_from_stops_at_clean_eof() {
        let data = [Record::new("a", "1").encode(), Record::new("b", "2").encode()].concat();
        let mut reader = data.as_slice();
        assert_eq!(Record::read_from(&mut reader).unwrap().unwrap().key, "a");
        assert_eq!(Record::read_from(&mut reader).unwrap().unwrap().key, "b");
        assert!(Record::read_from(&mut reader).unwrap().is_none());
    }

    #[test]
    fn torn_length_prefix_is_corrupt() {
        let mut data = Record::new("a", "1").encode();
        data.extend_from_slice(&[0xde, 0xad, 0xbe]);
        let mut reader = data.as_slice();
        assert!(Record::read_from(&mut reader).unwrap().is_some());
        assert!(matches!(
            Record::read_from(&mut reader),
            Err(Error::CorruptRecord(_))
        ));
    }

    #[test]
    fn truncated_record_is_corrupt() {
        let data = Record::new("key", "value").encode();
        let mut reader = &data[..data.len() - 2];
        assert!(matches!(
            Record::read_from(&mut reader),
            Err(Error::CorruptRecord(_))
        ));
    }

    #[test]
    fn mismatched_lengths_are_corrupt() {
        let mut data = Record::new("key", "value").encode();
        // Inflate the declared total beyond what the trailing lengths add up to.
        data[0] = data[0].wrapping_add(4);
        data.extend_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            Record::decode(&data),
            Err(Error::CorruptRecord(_))
        ));
    }

    #[test]
    fn tombstone_helpers() {
        let record = Record::tombstone("gone");
        assert!(record.is_tombstone());
        assert_eq!(record.value, TOMBSTONE);
        assert!(!Record::new("k", "DELETED").is_tombstone());
    }
}
