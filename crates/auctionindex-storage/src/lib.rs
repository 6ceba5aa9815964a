//! auctionindex-storage — storage backends for the auction indexer.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - `postgres` — PostgreSQL via `sqlx` (feature `postgres`)

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStorage;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresOptions, PostgresStorage};
