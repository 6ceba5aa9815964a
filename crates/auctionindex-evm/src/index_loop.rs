//! The index loop: one catch-up pass per network.
//!
//! For each network:
//!   checkpoint → tip − confirmations → fetch `[from, to]` → decode →
//!   patch → upsert → advance checkpoint.
//!
//! A bad log is skipped; a failed upsert holds the checkpoint back so the
//! range is re-merged on the next run; an RPC or checkpoint failure ends that
//! network's pass without touching the others.

use std::sync::Arc;

use serde::Serialize;

use auctionindex_core::checkpoint::CheckpointStore;
use auctionindex_core::error::IndexerError;
use auctionindex_core::network::Network;
use auctionindex_core::store::AuctionStore;

use crate::decoder::EventDecoder;
use crate::fetcher::{confirmed_range, LogFetcher, LogFilter};
use crate::patch::patch_for;
use crate::rpc::EvmRpcClient;

/// Counters for one network pass that reached the fetch step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub from_block: u64,
    pub to_block: u64,
    pub fetched: usize,
    pub decoded: usize,
    pub merged: usize,
    /// Decoded events that carry no auction patch.
    pub ignored: usize,
    pub decode_failures: usize,
    pub merge_failures: usize,
    /// Checkpoint after the pass; equals `to_block` unless a merge failed.
    pub checkpoint: u64,
}

impl PassStats {
    pub fn checkpoint_advanced(&self) -> bool {
        self.merge_failures == 0
    }
}

/// How a network's pass ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PassOutcome {
    Indexed(PassStats),
    NoNewBlocks { from_block: u64, to_block: u64 },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub network: String,
    pub chain_id: u64,
    #[serde(flatten)]
    pub outcome: PassOutcome,
}

/// Result of a full run over all selected networks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub reports: Vec<PassReport>,
}

impl RunSummary {
    fn count(&self, pred: impl Fn(&PassOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn indexed(&self) -> usize {
        self.count(|o| matches!(o, PassOutcome::Indexed(_)))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|o| matches!(o, PassOutcome::NoNewBlocks { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, PassOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PassOutcome::Failed { .. }))
    }
}

/// Drives catch-up passes against a checkpoint store and an auction store.
pub struct IndexLoop {
    checkpoints: Arc<dyn CheckpointStore>,
    auctions: Arc<dyn AuctionStore>,
    decoder: EventDecoder,
}

impl IndexLoop {
    pub fn new(checkpoints: Arc<dyn CheckpointStore>, auctions: Arc<dyn AuctionStore>) -> Self {
        Self {
            checkpoints,
            auctions,
            decoder: EventDecoder::new(),
        }
    }

    /// Run one pass per network, in order.
    ///
    /// `connect` builds the RPC client for a configured network from its
    /// endpoint URL. No failure escapes a single network.
    pub async fn run<C, F>(&self, networks: &[Network], connect: F) -> RunSummary
    where
        C: EvmRpcClient,
        F: Fn(&Network, &str) -> Result<C, IndexerError>,
    {
        let mut summary = RunSummary::default();

        for network in networks {
            let report = match network.endpoint() {
                Err(e) => {
                    tracing::warn!(network = %network.key, chain = network.chain_id, error = %e, "skipping network");
                    self.report(network, PassOutcome::Skipped { reason: e.to_string() })
                }
                Ok((url, _)) => match connect(network, url) {
                    Ok(client) => self.run_network(network, client).await,
                    Err(e) => {
                        tracing::error!(network = %network.key, chain = network.chain_id, error = %e, "failed to build rpc client");
                        self.report(network, PassOutcome::Failed { error: e.to_string() })
                    }
                },
            };
            summary.reports.push(report);
        }

        tracing::info!(
            networks = summary.reports.len(),
            indexed = summary.indexed(),
            up_to_date = summary.up_to_date(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "indexing run complete"
        );
        summary
    }

    /// Run one catch-up pass for `network` using `client`.
    pub async fn run_network<C: EvmRpcClient>(&self, network: &Network, client: C) -> PassReport {
        let contract = match network.endpoint() {
            Ok((_, contract)) => contract.to_string(),
            Err(e) => {
                tracing::warn!(network = %network.key, chain = network.chain_id, error = %e, "skipping network");
                return self.report(network, PassOutcome::Skipped { reason: e.to_string() });
            }
        };

        let outcome = match self.pass(network, contract, client).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(network = %network.key, chain = network.chain_id, error = %e, "indexing pass failed");
                PassOutcome::Failed { error: e.to_string() }
            }
        };
        self.report(network, outcome)
    }

    async fn pass<C: EvmRpcClient>(
        &self,
        network: &Network,
        contract: String,
        client: C,
    ) -> Result<PassOutcome, IndexerError> {
        let chain = network.chain_id;
        let filter = LogFilter {
            address: contract,
            topic0: self.decoder.topic0_filter(),
        };
        let fetcher = LogFetcher::new(client, filter, network.batch_size);

        let from_block = self.checkpoints.get(chain, network.start_block).await?;
        let tip = fetcher.head_block_number().await?;

        let Some((from_block, to_block)) = confirmed_range(from_block, tip, network.confirmations)
        else {
            let to_block = tip.saturating_sub(network.confirmations);
            tracing::info!(network = %network.key, chain, from = from_block, to = to_block, tip, "no new confirmed blocks");
            return Ok(PassOutcome::NoNewBlocks { from_block, to_block });
        };

        tracing::info!(network = %network.key, chain, from = from_block, to = to_block, tip, "indexing range");
        let logs = fetcher.fetch(from_block, to_block).await?;

        let mut stats = PassStats {
            from_block,
            to_block,
            fetched: logs.len(),
            checkpoint: from_block,
            ..Default::default()
        };

        for log in &logs {
            let decoded = match self.decoder.decode(log) {
                Ok(d) => d,
                Err(e) => {
                    stats.decode_failures += 1;
                    tracing::warn!(
                        chain,
                        block = ?log.block_number_u64(),
                        tx = ?log.tx_hash,
                        error = %e,
                        "skipping undecodable log"
                    );
                    continue;
                }
            };
            stats.decoded += 1;

            let patch = match patch_for(chain, &decoded) {
                Ok(Some(p)) => p,
                Ok(None) => {
                    stats.ignored += 1;
                    tracing::debug!(chain, event = %decoded.event.kind(), auction = decoded.event.auction_id(), "event carries no auction update");
                    continue;
                }
                Err(e) => {
                    stats.merge_failures += 1;
                    tracing::error!(chain, event = %decoded.event.kind(), error = %e, "failed to build auction patch");
                    continue;
                }
            };

            match self.auctions.upsert(&patch).await {
                Ok(()) => {
                    stats.merged += 1;
                    tracing::debug!(
                        chain,
                        event = %decoded.event.kind(),
                        auction = %patch.auction_id,
                        block = decoded.block_number,
                        "merged auction event"
                    );
                }
                Err(e) => {
                    stats.merge_failures += 1;
                    tracing::error!(
                        chain,
                        event = %decoded.event.kind(),
                        auction = %patch.auction_id,
                        block = decoded.block_number,
                        tx = %decoded.tx_hash,
                        error = %e,
                        "failed to merge auction event"
                    );
                }
            }
        }

        if stats.checkpoint_advanced() {
            self.checkpoints.set(chain, to_block).await?;
            stats.checkpoint = to_block;
        } else {
            tracing::warn!(
                chain,
                merge_failures = stats.merge_failures,
                checkpoint = from_block,
                "checkpoint not advanced; range will be re-merged"
            );
        }

        tracing::info!(
            network = %network.key,
            chain,
            fetched = stats.fetched,
            decoded = stats.decoded,
            merged = stats.merged,
            ignored = stats.ignored,
            decode_failures = stats.decode_failures,
            merge_failures = stats.merge_failures,
            checkpoint = stats.checkpoint,
            "pass complete"
        );
        Ok(PassOutcome::Indexed(stats))
    }

    fn report(&self, network: &Network, outcome: PassOutcome) -> PassReport {
        PassReport {
            network: network.key.clone(),
            chain_id: network.chain_id,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::fixtures::{
        auction_created_log, cancelled_log, community_created_log, finalized_log,
        liquidity_added_log, log_at, maker_joined_log, MockClient, CONTRACT, TOKEN_A,
    };
    use async_trait::async_trait;
    use auctionindex_core::auction::{AuctionKind, AuctionPatch, AuctionRecord};
    use auctionindex_core::store::AuctionQuery;
    use auctionindex_storage::InMemoryStorage;

    fn network(start_block: u64, confirmations: u64) -> Network {
        Network {
            key: "testnet".into(),
            chain_id: 31337,
            rpc_url: Some("http://localhost:8545".into()),
            contract_address: Some(CONTRACT.into()),
            start_block,
            confirmations,
            batch_size: 2_000,
            issues: vec![],
        }
    }

    fn indexer(storage: &Arc<InMemoryStorage>) -> IndexLoop {
        IndexLoop::new(storage.clone(), storage.clone())
    }

    fn stats(report: &PassReport) -> &PassStats {
        match &report.outcome {
            PassOutcome::Indexed(s) => s,
            other => panic!("expected Indexed, got {other:?}"),
        }
    }

    async fn checkpoint(storage: &InMemoryStorage, chain: u64) -> u64 {
        CheckpointStore::get(storage, chain, 0).await.unwrap()
    }

    #[tokio::test]
    async fn create_then_cancel_preserves_terms() {
        let storage = Arc::new(InMemoryStorage::new());
        let client = Arc::new(MockClient::new(
            110,
            vec![
                auction_created_log(7, 102),
                cancelled_log(EventKind::AuctionCancelled, 7, 104),
            ],
        ));

        let report = indexer(&storage).run_network(&network(100, 5), client.clone()).await;
        let s = stats(&report);
        assert_eq!((s.from_block, s.to_block), (100, 105));
        assert_eq!((s.fetched, s.decoded, s.merged), (2, 2, 2));
        assert_eq!(s.checkpoint, 105);
        assert_eq!(client.ranges(), vec![(100, 105)]);
        assert_eq!(checkpoint(&storage, 31337).await, 105);

        let row = AuctionStore::get(storage.as_ref(), 31337, "7").await.unwrap().unwrap();
        assert_eq!(row.kind, AuctionKind::Solo);
        assert!(!row.active);
        assert!(row.finalized);
        assert_eq!(row.token_a.as_deref(), Some(TOKEN_A.to_ascii_lowercase().as_str()));
        assert_eq!(row.pool_id_a, Some(format!("0x{}", "0a".repeat(32))));
        assert_eq!(row.reserve_a.as_deref(), Some("1000000"));
        assert_eq!(row.fee_bps, Some(30));
        assert_eq!(row.block_number, 104);
        assert_eq!(row.raw_event["event"], "AuctionCancelled");
    }

    #[tokio::test]
    async fn community_auction_closes_on_a_later_run() {
        let storage = Arc::new(InMemoryStorage::new());
        let client = Arc::new(MockClient::new(
            20,
            vec![
                community_created_log(5, 8),
                finalized_log(EventKind::CommunityAuctionFinalized, 5, 25),
            ],
        ));
        let indexer = indexer(&storage);

        indexer.run_network(&network(0, 0), client.clone()).await;
        let row = AuctionStore::get(storage.as_ref(), 31337, "5").await.unwrap().unwrap();
        assert_eq!(row.kind, AuctionKind::Community);
        assert!(row.active);
        assert_eq!(row.maker_position_id.as_deref(), Some("11"));

        client.set_head(40);
        indexer.run_network(&network(0, 0), client.clone()).await;
        let row = AuctionStore::get(storage.as_ref(), 31337, "5").await.unwrap().unwrap();
        assert!(row.finalized);
        assert_eq!(row.reserve_a.as_deref(), Some("340282366920938463463374607431768211456"));
        assert_eq!(row.fee_asset, Some(1));
        assert_eq!(client.ranges(), vec![(0, 20), (20, 40)]);
        assert_eq!(checkpoint(&storage, 31337).await, 40);
    }

    #[tokio::test]
    async fn liquidity_update_overwrites_reserves_only() {
        let storage = Arc::new(InMemoryStorage::new());
        let client = MockClient::new(
            200,
            vec![auction_created_log(1, 10), liquidity_added_log(1, 5, 6, 11)],
        );
        indexer(&storage).run_network(&network(0, 0), client).await;

        let row = AuctionStore::get(storage.as_ref(), 31337, "1").await.unwrap().unwrap();
        assert!(row.active);
        assert_eq!(row.reserve_a.as_deref(), Some("5"));
        assert_eq!(row.reserve_b.as_deref(), Some("6"));
        assert_eq!(row.start_time, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn maker_joined_changes_nothing() {
        let storage = Arc::new(InMemoryStorage::new());
        let client = MockClient::new(50, vec![maker_joined_log(3, 20)]);

        let report = indexer(&storage).run_network(&network(0, 0), client).await;
        let s = stats(&report);
        assert_eq!((s.decoded, s.ignored, s.merged), (1, 1, 0));
        assert_eq!(storage.auction_count(), 0);
        assert_eq!(checkpoint(&storage, 31337).await, 50);
    }

    #[tokio::test]
    async fn unknown_log_is_skipped_and_checkpoint_advances() {
        let storage = Arc::new(InMemoryStorage::new());
        let client = MockClient::new(30, vec![log_at(10, 0), auction_created_log(4, 12)]);

        let report = indexer(&storage).run_network(&network(0, 0), client).await;
        let s = stats(&report);
        assert_eq!(s.decode_failures, 1);
        assert_eq!(s.merged, 1);
        assert_eq!(checkpoint(&storage, 31337).await, 30);
    }

    #[tokio::test]
    async fn nothing_confirmed_makes_no_calls() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.set(31337, 105).await.unwrap();
        let client = Arc::new(MockClient::new(110, vec![]));

        let report = indexer(&storage).run_network(&network(100, 5), client.clone()).await;
        assert_eq!(
            report.outcome,
            PassOutcome::NoNewBlocks { from_block: 105, to_block: 105 }
        );
        assert!(client.ranges().is_empty());
        assert_eq!(checkpoint(&storage, 31337).await, 105);
    }

    #[tokio::test]
    async fn rpc_failure_keeps_checkpoint() {
        let storage = Arc::new(InMemoryStorage::new());
        let client = MockClient::new(110, vec![auction_created_log(7, 102)]);
        client.fail_logs(true);

        let report = indexer(&storage).run_network(&network(100, 5), client).await;
        assert!(matches!(report.outcome, PassOutcome::Failed { .. }));
        assert_eq!(checkpoint(&storage, 31337).await, 0);
        assert_eq!(storage.auction_count(), 0);
    }

    /// Rejects upserts for one auction id.
    struct RejectingStore {
        inner: Arc<InMemoryStorage>,
        reject: &'static str,
    }

    #[async_trait]
    impl AuctionStore for RejectingStore {
        async fn upsert(&self, patch: &AuctionPatch) -> Result<(), IndexerError> {
            if patch.auction_id == self.reject {
                return Err(IndexerError::Persistence("deadlock detected".into()));
            }
            self.inner.upsert(patch).await
        }

        async fn get(&self, chain_id: u64, auction_id: &str) -> Result<Option<AuctionRecord>, IndexerError> {
            AuctionStore::get(self.inner.as_ref(), chain_id, auction_id).await
        }

        async fn list(&self, query: &AuctionQuery) -> Result<Vec<AuctionRecord>, IndexerError> {
            self.inner.list(query).await
        }
    }

    #[tokio::test]
    async fn merge_failure_holds_checkpoint_but_merges_the_rest() {
        let storage = Arc::new(InMemoryStorage::new());
        let store = Arc::new(RejectingStore { inner: storage.clone(), reject: "1" });
        let indexer = IndexLoop::new(storage.clone(), store);
        let client = MockClient::new(
            110,
            vec![auction_created_log(1, 101), auction_created_log(2, 103)],
        );

        let report = indexer.run_network(&network(100, 5), client).await;
        let s = stats(&report);
        assert_eq!((s.merged, s.merge_failures), (1, 1));
        assert_eq!(s.checkpoint, 100);
        assert!(!s.checkpoint_advanced());
        assert_eq!(checkpoint(&storage, 31337).await, 0);
        assert!(AuctionStore::get(storage.as_ref(), 31337, "2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rerunning_a_range_is_idempotent() {
        let storage = Arc::new(InMemoryStorage::new());
        let logs = vec![
            auction_created_log(7, 102),
            cancelled_log(EventKind::AuctionCancelled, 7, 104),
        ];
        let indexer = indexer(&storage);

        indexer.run_network(&network(100, 5), MockClient::new(110, logs.clone())).await;
        let first = storage.auctions();

        // Force the same range again.
        storage.set(31337, 100).await.unwrap();
        indexer.run_network(&network(100, 5), MockClient::new(110, logs)).await;
        let second = storage.auctions();

        assert_eq!(first.len(), 1);
        let strip = |rows: Vec<AuctionRecord>| {
            rows.into_iter()
                .map(|mut r| {
                    r.updated_at = chrono::DateTime::<chrono::Utc>::default();
                    r
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(first), strip(second));
    }

    #[tokio::test]
    async fn run_skips_unconfigured_and_continues() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut missing = network(0, 0);
        missing.key = "base".into();
        missing.chain_id = 8453;
        missing.rpc_url = None;
        missing.issues = vec!["BASE_RPC_URL is not set".into()];

        let networks = vec![missing, network(0, 0)];
        let summary = indexer(&storage)
            .run(&networks, |_, _| Ok(MockClient::new(20, vec![auction_created_log(9, 5)])))
            .await;

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.indexed(), 1);
        assert!(matches!(
            &summary.reports[0].outcome,
            PassOutcome::Skipped { reason } if reason.contains("BASE_RPC_URL")
        ));
        assert_eq!(checkpoint(&storage, 8453).await, 0);
        assert_eq!(checkpoint(&storage, 31337).await, 20);
    }

    #[tokio::test]
    async fn connect_failure_is_contained() {
        let storage = Arc::new(InMemoryStorage::new());
        let networks = vec![network(0, 0)];
        let summary = indexer(&storage)
            .run(&networks, |_, url| -> Result<MockClient, IndexerError> {
                Err(IndexerError::Network(format!("bad url {url}")))
            })
            .await;
        assert_eq!(summary.failed(), 1);
    }

    #[test]
    fn report_serializes_flat() {
        let report = PassReport {
            network: "base".into(),
            chain_id: 8453,
            outcome: PassOutcome::Skipped { reason: "no rpc".into() },
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["outcome"], "skipped");
        assert_eq!(v["reason"], "no rpc");
        assert_eq!(v["chain_id"], 8453);
    }
}
