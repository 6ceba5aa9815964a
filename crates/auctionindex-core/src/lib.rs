//! auctionindex-core — shared model for the auction chain-log indexer.
//!
//! # Architecture
//!
//! ```text
//! Network registry ─▶ IndexLoop (auctionindex-evm)
//!                        ├── LogFetcher      (eth_getLogs over a confirmed range)
//!                        ├── EventDecoder    (topic0 → typed auction events)
//!                        ├── AuctionStore    (patch upsert, merge rule)
//!                        └── CheckpointStore (per-chain cursor)
//! ```

pub mod auction;
pub mod checkpoint;
pub mod error;
pub mod network;
pub mod store;

pub use auction::{AuctionKind, AuctionPatch, AuctionRecord, AuctionStatus};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use error::IndexerError;
pub use network::{Network, NetworkDefinition, NetworkSelection, BUILTIN_NETWORKS};
pub use store::{AuctionQuery, AuctionScope, AuctionStore};
