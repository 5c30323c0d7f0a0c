//! # Seglog Storage Engine
//!
//! Log-structured, segmented, append-only key/value store with a sparse
//! in-memory index per segment, background compaction, and crash recovery
//! from the on-disk logs.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Write Path                             │
//! │                                                             │
//! │  put/delete ──► write queue ──► Writer (owns active file)   │
//! │                                   │ append, then publish    │
//! │                                   ▼                         │
//! │                                index queue ──► Arbiter      │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Read Path                              │
//! │                                                             │
//! │  get ──► Arbiter (segment list, newest first) ──► (seg,off) │
//! │            │                                                │
//! │            ▼                                                │
//! │   caller opens the segment file and reads one record        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exactly one segment is *active*; the rest are *sealed*. When the list
//! reaches three segments a background compactor folds every sealed
//! segment into one, keeping only the newest live value per key.

mod arbiter;
mod compaction;
mod writer;

pub mod segment;
pub mod store;

pub use segment::Segment;
pub use store::{Store, StoreStats};
