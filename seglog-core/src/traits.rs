//! Key/value contract shared by the engine and the HTTP layer.

use async_trait::async_trait;

use crate::error::Result;

/// The four-operation contract the HTTP front-ends program against.
///
/// Keys and values are UTF-8 strings. `get` returns
/// [`crate::Error::NotFound`] for keys that are absent or tombstoned.
#[async_trait]
pub trait KeyValue: Send + Sync {
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<String>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Stop background services and release the active file handle.
    /// In-flight writes drain first; operations issued afterwards fail
    /// with [`crate::Error::Closed`].
    async fn close(&self) -> Result<()>;
}
