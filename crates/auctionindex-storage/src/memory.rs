//! In-memory storage backend.
//!
//! Holds checkpoints and auction rows in RAM with the same merge semantics as
//! the Postgres backend. Used by tests and dry runs.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use auctionindex_core::auction::{AuctionPatch, AuctionRecord};
use auctionindex_core::checkpoint::{Checkpoint, CheckpointStore};
use auctionindex_core::error::IndexerError;
use auctionindex_core::store::{AuctionQuery, AuctionStore};

/// In-memory indexer storage.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStorage {
    checkpoints: Mutex<HashMap<u64, Checkpoint>>,
    auctions: Mutex<BTreeMap<(u64, String), AuctionRecord>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored auction rows.
    pub fn auction_count(&self) -> usize {
        self.auctions.lock().unwrap().len()
    }

    /// Snapshot of every stored row, ordered by identity.
    pub fn auctions(&self) -> Vec<AuctionRecord> {
        self.auctions.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStorage {
    async fn load(&self, chain_id: u64) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self.checkpoints.lock().unwrap().get(&chain_id).cloned())
    }

    async fn save(&self, chain_id: u64, block_number: u64) -> Result<(), IndexerError> {
        let cp = Checkpoint {
            chain_id,
            block_number,
            updated_at: chrono::Utc::now().timestamp(),
        };
        self.checkpoints.lock().unwrap().insert(chain_id, cp);
        Ok(())
    }
}

#[async_trait]
impl AuctionStore for InMemoryStorage {
    async fn upsert(&self, patch: &AuctionPatch) -> Result<(), IndexerError> {
        let now = chrono::Utc::now();
        let key = (patch.chain_id, patch.auction_id.clone());
        let mut auctions = self.auctions.lock().unwrap();
        match auctions.get_mut(&key) {
            Some(row) => row.apply(patch.clone(), now),
            None => {
                auctions.insert(key, AuctionRecord::from_patch(patch.clone(), now));
            }
        }
        Ok(())
    }

    async fn get(
        &self,
        chain_id: u64,
        auction_id: &str,
    ) -> Result<Option<AuctionRecord>, IndexerError> {
        Ok(self
            .auctions
            .lock()
            .unwrap()
            .get(&(chain_id, auction_id.to_string()))
            .cloned())
    }

    async fn list(&self, query: &AuctionQuery) -> Result<Vec<AuctionRecord>, IndexerError> {
        let mut rows: Vec<AuctionRecord> = self
            .auctions
            .lock()
            .unwrap()
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(a.chain_id.cmp(&b.chain_id))
                .then_with(|| numeric_cmp(&a.auction_id, &b.auction_id))
        });
        Ok(rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.effective_limit() as usize)
            .collect())
    }
}

/// Order decimal strings by value, the way a `NUMERIC` column sorts.
fn numeric_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use auctionindex_core::auction::{AuctionKind, AuctionStatus};
    use auctionindex_core::store::AuctionScope;
    use serde_json::json;

    fn patch(chain: u64, id: &str, status: AuctionStatus) -> AuctionPatch {
        AuctionPatch::new(chain, id, AuctionKind::Solo, status, json!({}), 1, "0x0")
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = InMemoryStorage::new();
        assert!(store.load(1).await.unwrap().is_none());
        store.save(1, 1000).await.unwrap();
        let loaded = store.load(1).await.unwrap().unwrap();
        assert_eq!(loaded.block_number, 1000);
        assert_eq!(CheckpointStore::get(&store, 1, 0).await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn upsert_inserts_then_merges() {
        let store = InMemoryStorage::new();
        let mut first = patch(1, "7", AuctionStatus::Active);
        first.token_a = Some("0xaaaa".into());
        store.upsert(&first).await.unwrap();
        store.upsert(&patch(1, "7", AuctionStatus::Closed)).await.unwrap();

        assert_eq!(store.auction_count(), 1);
        let row = AuctionStore::get(&store, 1, "7").await.unwrap().unwrap();
        assert!(row.finalized);
        assert!(!row.active);
        assert_eq!(row.token_a.as_deref(), Some("0xaaaa"));
    }

    #[tokio::test]
    async fn same_auction_id_on_two_chains_is_two_rows() {
        let store = InMemoryStorage::new();
        store.upsert(&patch(1, "7", AuctionStatus::Active)).await.unwrap();
        store.upsert(&patch(8453, "7", AuctionStatus::Active)).await.unwrap();
        assert_eq!(store.auction_count(), 2);
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let store = InMemoryStorage::new();
        store.upsert(&patch(1, "1", AuctionStatus::Active)).await.unwrap();
        store.upsert(&patch(1, "2", AuctionStatus::Closed)).await.unwrap();
        store.upsert(&patch(10, "3", AuctionStatus::Active)).await.unwrap();

        let active = store.list(&AuctionQuery::default()).await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|r| r.active));

        let all_chain_1 = store
            .list(&AuctionQuery {
                scope: AuctionScope::All,
                chain_id: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all_chain_1.len(), 2);

        let page_two = store
            .list(&AuctionQuery {
                scope: AuctionScope::All,
                page: 2,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page_two.len(), 1);
    }
}
