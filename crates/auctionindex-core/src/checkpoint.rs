//! Checkpoint store, the durable per-chain "last indexed block" cursor.
//!
//! A checkpoint is written only after every log of a pass has been merged, so
//! on restart the indexer resumes from the last fully indexed block. The store
//! itself does not enforce monotonicity; the orchestrator only ever moves the
//! cursor forward.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// A persisted checkpoint for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Last successfully indexed block number.
    pub block_number: u64,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

/// Trait for storing and loading checkpoints.
///
/// Implemented by `InMemoryStorage` and `PostgresStorage` in
/// `auctionindex-storage`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint row for a chain, if any.
    async fn load(&self, chain_id: u64) -> Result<Option<Checkpoint>, IndexerError>;

    /// Unconditionally overwrite the checkpoint for a chain.
    async fn save(&self, chain_id: u64, block_number: u64) -> Result<(), IndexerError>;

    /// Resume point for a chain: the stored block, or `start_block` on first run.
    async fn get(&self, chain_id: u64, start_block: u64) -> Result<u64, IndexerError> {
        Ok(self
            .load(chain_id)
            .await?
            .map(|cp| cp.block_number)
            .unwrap_or(start_block))
    }

    /// Alias of [`CheckpointStore::save`].
    async fn set(&self, chain_id: u64, block_number: u64) -> Result<(), IndexerError> {
        self.save(chain_id, block_number).await
    }
}
