//! auctionindex-evm — EVM log fetcher, auction event decoder, and index loop.

pub mod decoder;
pub mod events;
pub mod fetcher;
pub mod index_loop;
pub mod patch;
pub mod rpc;

#[cfg(test)]
mod fixtures;

pub use decoder::{DecodeError, EventDecoder};
pub use events::{AuctionEvent, DecodedEvent, EventKind};
pub use fetcher::{LogFetcher, LogFilter, RawLog};
pub use index_loop::{IndexLoop, PassOutcome, PassReport, PassStats, RunSummary};
pub use patch::patch_for;
pub use rpc::{EvmRpcClient, HttpRpcClient};
