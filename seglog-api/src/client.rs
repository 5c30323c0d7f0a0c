//! # Remote Client
//!
//! Connect to a seglog server (or the balancer in front of a fleet of
//! them) over HTTP.

use async_trait::async_trait;

use seglog_core::error::{Error, Result};
use seglog_core::traits::KeyValue;

use crate::server::{ReqBody, RespBody};

/// Remote client for the seglog HTTP API
pub struct RemoteClient {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteClient {
    /// Connect to a server and verify it answers on `/health`.
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self> {
        let base_url = endpoint.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::new();

        client
            .get(format!("{}/health", base_url))
            .send()
            .await
            .map_err(|e| Error::Internal(format!("connection failed: {}", e)))?;

        Ok(Self { base_url, client })
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/db/{}", self.base_url, key))
            .json(&ReqBody {
                value: value.to_string(),
            })
            .send()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Self::expect_success(resp).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<String> {
        let resp = self
            .client
            .get(format!("{}/db/{}", self.base_url, key))
            .send()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound);
        }
        let resp = Self::expect_success(resp).await?;
        let body: RespBody = resp
            .json()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(body.value)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let resp = self
            .client
            .delete(format!("{}/db/{}", self.base_url, key))
            .send()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Self::expect_success(resp).await?;
        Ok(())
    }

    /// Server-side stats, as reported by `/stats`.
    pub async fn stats(&self) -> Result<serde_json::Value> {
        self.client
            .get(format!("{}/stats", self.base_url))
            .send()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Internal(e.to_string()))
    }

    async fn expect_success(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(Error::Internal(format!("server returned {status}: {message}")))
    }
}

#[async_trait]
impl KeyValue for RemoteClient {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        RemoteClient::put(self, key, value).await
    }

    async fn get(&self, key: &str) -> Result<String> {
        RemoteClient::get(self, key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        RemoteClient::delete(self, key).await
    }

    async fn close(&self) -> Result<()> {
        // Nothing server-side to release; the connection pool drops with
        // the client.
        Ok(())
    }
}
