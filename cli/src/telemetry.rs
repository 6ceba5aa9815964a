//! Logging initialisation.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How log lines are filtered and formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directives, e.g. `"info,auctionindex_evm=debug"`.
    pub filter: String,
    /// One JSON object per line instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Read `INDEXER_LOG` (falling back to `RUST_LOG`) and `INDEXER_LOG_JSON`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let filter = env("INDEXER_LOG")
            .or_else(|| env("RUST_LOG"))
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| "info".into());
        let json = env("INDEXER_LOG_JSON")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self { filter, json }
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
