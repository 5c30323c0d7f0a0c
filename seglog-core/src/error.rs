//! # Error Handling
//!
//! Error types shared by every seglog component.
//!
//! The store never retries internally: every fault is surfaced to the
//! caller, and the background agents stay alive to serve the next request.

use thiserror::Error;

/// Result type alias for seglog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for seglog
#[derive(Error, Debug)]
pub enum Error {
    /// Key absent, or its newest record is a tombstone.
    #[error("record does not exist")]
    NotFound,

    /// Underlying filesystem fault (open, seek, read, write, stat).
    #[error("io error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Structural decode failure during recovery or read.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// Operation issued after `close`.
    #[error("store is closed")]
    Closed,

    /// The reserved tombstone value was supplied as a user value.
    #[error("value {0:?} is reserved")]
    ReservedValue(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for the absent-or-tombstoned case callers recover from locally.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// Error code for monitoring and log correlation
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NotFound => "NOT_FOUND",
            Error::Io { .. } => "IO_ERROR",
            Error::CorruptRecord(_) => "CORRUPT_RECORD",
            Error::Closed => "CLOSED",
            Error::ReservedValue(_) => "RESERVED_VALUE",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}
