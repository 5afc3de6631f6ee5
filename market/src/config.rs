//! Configuration constants and runtime settings for the listing core.
//!
//! `MarketConfig` starts from the defaults below; each field can be
//! overridden through a `MARKET_*` environment variable.

use std::time::Duration;

use crate::error::{MarketError, MarketResult};

/// Default bound on a single store mutation (update or delete).
pub const DEFAULT_MUTATION_TIMEOUT_MS: u64 = 10_000;

/// Default bound on waiting for the first snapshot after subscribing.
pub const DEFAULT_SNAPSHOT_TIMEOUT_MS: u64 = 10_000;

/// Maximum size of an encoded listing document.
pub const MAX_LISTING_DOCUMENT_BYTES: usize = 32_768;

/// Number of random bytes in a generated listing id (hex-encoded).
pub const LISTING_ID_BYTES: usize = 10;

/// Environment variable overriding the mutation timeout (milliseconds).
pub const MUTATION_TIMEOUT_ENV: &str = "MARKET_MUTATION_TIMEOUT_MS";

/// Environment variable overriding the initial snapshot timeout (milliseconds).
pub const SNAPSHOT_TIMEOUT_ENV: &str = "MARKET_SNAPSHOT_TIMEOUT_MS";

/// Environment variable selecting the write consistency mode.
pub const CONSISTENCY_ENV: &str = "MARKET_CONSISTENCY";

/// How lifecycle writes interact with concurrent writers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsistencyMode {
    /// Unconditional field updates. Concurrent writers race and the store
    /// keeps the last write; losers find out from the next snapshot.
    #[default]
    LastWriteWins,
    /// Updates carry the revision they were validated against and the store
    /// rejects them with `Conflict` if the record moved on.
    Guarded,
}

impl std::str::FromStr for ConsistencyMode {
    type Err = MarketError;

    fn from_str(s: &str) -> MarketResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" | "lww" => Ok(Self::LastWriteWins),
            "guarded" => Ok(Self::Guarded),
            other => Err(MarketError::Config(format!(
                "Unknown consistency mode '{other}' (expected 'lww' or 'guarded')"
            ))),
        }
    }
}

/// Runtime configuration shared by the engine, synchronizer and sessions.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub mutation_timeout: Duration,
    pub snapshot_timeout: Duration,
    pub consistency: ConsistencyMode,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            mutation_timeout: Duration::from_millis(DEFAULT_MUTATION_TIMEOUT_MS),
            snapshot_timeout: Duration::from_millis(DEFAULT_SNAPSHOT_TIMEOUT_MS),
            consistency: ConsistencyMode::default(),
        }
    }
}

impl MarketConfig {
    /// Build a configuration from the defaults, overridden by environment variables.
    pub fn from_env() -> MarketResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`MarketConfig::from_env`] with an injectable variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> MarketResult<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(MUTATION_TIMEOUT_ENV) {
            config.mutation_timeout = parse_millis(MUTATION_TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = lookup(SNAPSHOT_TIMEOUT_ENV) {
            config.snapshot_timeout = parse_millis(SNAPSHOT_TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = lookup(CONSISTENCY_ENV) {
            config.consistency = raw.parse()?;
        }

        Ok(config)
    }

    #[must_use]
    pub const fn with_consistency(mut self, consistency: ConsistencyMode) -> Self {
        self.consistency = consistency;
        self
    }

    #[must_use]
    pub const fn with_mutation_timeout(mut self, timeout: Duration) -> Self {
        self.mutation_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }
}

fn parse_millis(name: &str, raw: &str) -> MarketResult<Duration> {
    let millis: u64 = raw
        .trim()
        .parse()
        .map_err(|e| MarketError::Config(format!("Invalid {name} '{raw}': {e}")))?;
    if millis == 0 {
        return Err(MarketError::Config(format!("{name} must be > 0")));
    }
    Ok(Duration::from_millis(millis))
}
