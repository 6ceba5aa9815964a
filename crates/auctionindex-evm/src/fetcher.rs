//! EVM log fetcher.
//!
//! Uses `eth_getLogs` restricted to the auction contract and the known event
//! signatures. Wide ranges are split into `batch_size` chunks so nodes that
//! cap the span of a single query still answer.

use serde::{Deserialize, Serialize};

use auctionindex_core::error::IndexerError;

use crate::rpc::EvmRpcClient;

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: Option<String>,
    #[serde(rename = "blockHash", default)]
    pub block_hash: Option<String>,
    #[serde(rename = "transactionHash")]
    pub tx_hash: Option<String>,
    #[serde(rename = "logIndex")]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl RawLog {
    /// Returns the block number, if present and well-formed.
    pub fn block_number_u64(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(parse_hex_u64)
    }

    /// Returns the log index within the block, if present and well-formed.
    pub fn log_index_u64(&self) -> Option<u64> {
        self.log_index.as_deref().and_then(parse_hex_u64)
    }

    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }
}

/// Which logs to request: one contract, any of the listed topic0 values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub address: String,
    pub topic0: Vec<String>,
}

/// Highest block that is safe to index, or `None` when there is nothing new.
///
/// The bound is `tip - confirmations`; a range is only returned when that
/// bound is strictly above `from_block`.
///
/// `from_block` is the checkpoint itself, so the boundary block is fetched
/// again and its rows are re-upserted, which bumps their `updated_at`.
pub fn confirmed_range(from_block: u64, tip: u64, confirmations: u64) -> Option<(u64, u64)> {
    let to_block = tip.checked_sub(confirmations)?;
    (to_block > from_block).then_some((from_block, to_block))
}

/// Log fetcher wrapping an [`EvmRpcClient`] with range splitting.
pub struct LogFetcher<C> {
    client: C,
    filter: LogFilter,
    batch_size: u64,
}

impl<C: EvmRpcClient> LogFetcher<C> {
    pub fn new(client: C, filter: LogFilter, batch_size: u64) -> Self {
        Self {
            client,
            filter,
            batch_size: batch_size.max(1),
        }
    }

    /// Fetch the current chain head block number.
    pub async fn head_block_number(&self) -> Result<u64, IndexerError> {
        self.client.get_block_number().await
    }

    /// Fetch all logs in `[from, to]`, ordered by (block, log index).
    ///
    /// Logs the node flags as `removed` are dropped.
    pub async fn fetch(&self, from: u64, to: u64) -> Result<Vec<RawLog>, IndexerError> {
        if to < from {
            return Err(IndexerError::Other(format!(
                "invalid block range: {from} > {to}"
            )));
        }

        let mut all_logs = Vec::new();
        let mut start = from;
        loop {
            let end = start.saturating_add(self.batch_size - 1).min(to);
            let chunk = self.client.get_logs(start, end, &self.filter).await?;
            tracing::debug!(from = start, to = end, logs = chunk.len(), "fetched log chunk");
            all_logs.extend(chunk.into_iter().filter(|l| !l.is_removed()));
            if end >= to {
                break;
            }
            start = end + 1;
        }

        all_logs.sort_by_key(|l| (l.block_number_u64(), l.log_index_u64()));
        Ok(all_logs)
    }
}

/// Parse a hex-encoded string (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}
