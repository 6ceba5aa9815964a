//! Error types for the auction indexing pipeline.

use thiserror::Error;

/// Errors that can occur during indexing.
///
/// Each variant maps to the smallest unit it aborts: a `Decode` error skips one
/// log, a `Network` error ends one chain's pass, and a `Config` error on the
/// store connection ends the whole run.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the error only affects a single log.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Returns `true` if the error came from the remote node.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
