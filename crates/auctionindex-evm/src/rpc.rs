//! JSON-RPC 2.0 wire types and the HTTP client used to talk to chain nodes.
//!
//! Only the two calls the indexer needs are exposed: `eth_blockNumber` and
//! `eth_getLogs`. There is no retry; a failed call aborts the current
//! network's pass and is retried on the next scheduled run.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use auctionindex_core::error::IndexerError;

use crate::fetcher::{parse_hex_u64, LogFilter, RawLog};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── Wire types ───────────────────────────────────────────────────────────────

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Unwrap the result value or return the node's error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

// ─── Client trait ─────────────────────────────────────────────────────────────

/// The node calls the indexer depends on.
///
/// Every failure is reported as [`IndexerError::Network`].
#[async_trait]
pub trait EvmRpcClient: Send + Sync {
    /// Current chain tip.
    async fn get_block_number(&self) -> Result<u64, IndexerError>;

    /// Logs in `[from, to]` matching `filter`.
    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        filter: &LogFilter,
    ) -> Result<Vec<RawLog>, IndexerError>;
}

#[async_trait]
impl<C: EvmRpcClient + ?Sized> EvmRpcClient for Arc<C> {
    async fn get_block_number(&self) -> Result<u64, IndexerError> {
        (**self).get_block_number().await
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        filter: &LogFilter,
    ) -> Result<Vec<RawLog>, IndexerError> {
        (**self).get_logs(from, to, filter).await
    }
}

// ─── HTTP client ──────────────────────────────────────────────────────────────

/// HTTP JSON-RPC client backed by `reqwest`.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a client for the given endpoint URL.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, IndexerError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IndexerError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create with the default request timeout.
    pub fn default_for(url: impl Into<String>) -> Result<Self, IndexerError> {
        Self::new(url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Call a method and deserialize its result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, IndexerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| IndexerError::Network(format!("{method}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexerError::Network(format!(
                "{method}: HTTP {status}: {body}"
            )));
        }

        let body: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| IndexerError::Network(format!("{method}: malformed response: {e}")))?;
        let result = body
            .into_result()
            .map_err(|e| IndexerError::Network(format!("{method}: {e}")))?;

        tracing::trace!(method, id, "rpc call complete");
        serde_json::from_value(result)
            .map_err(|e| IndexerError::Network(format!("{method}: unexpected result: {e}")))
    }
}

#[async_trait]
impl EvmRpcClient for HttpRpcClient {
    async fn get_block_number(&self) -> Result<u64, IndexerError> {
        let hex: String = self.call("eth_blockNumber", vec![]).await?;
        parse_hex_u64(&hex).ok_or_else(|| {
            IndexerError::Network(format!("eth_blockNumber: malformed block number '{hex}'"))
        })
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        filter: &LogFilter,
    ) -> Result<Vec<RawLog>, IndexerError> {
        self.call("eth_getLogs", vec![get_logs_params(from, to, filter)])
            .await
    }
}

/// Build the single filter object `eth_getLogs` takes.
pub fn get_logs_params(from: u64, to: u64, filter: &LogFilter) -> Value {
    json!({
        "fromBlock": format!("0x{from:x}"),
        "toBlock": format!("0x{to:x}"),
        "address": filter.address,
        // One OR-list in position 0: match any known topic0.
        "topics": [filter.topic0],
    })
}
