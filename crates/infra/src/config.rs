//! Ledger configuration.
//!
//! Defaults are usable as-is; `from_env` overlays the `STOCK_LEDGER_*` variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use stockledger_inventory::Thresholds;

use crate::retry::RetryPolicy;

pub const ENV_MAX_ATTEMPTS: &str = "STOCK_LEDGER_MAX_ATTEMPTS";
pub const ENV_INITIAL_BACKOFF_MS: &str = "STOCK_LEDGER_INITIAL_BACKOFF_MS";
pub const ENV_MAX_BACKOFF_MS: &str = "STOCK_LEDGER_MAX_BACKOFF_MS";
pub const ENV_RESERVATION_TTL_SECS: &str = "STOCK_LEDGER_RESERVATION_TTL_SECS";

/// Default lifetime of a reservation placed through `reserve_stock`.
pub const DEFAULT_RESERVATION_TTL: Duration = Duration::from_secs(15 * 60);

/// Longest reservation TTL accepted from the environment.
pub const MAX_RESERVATION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub retry: RetryPolicy,
    /// Expiry applied to reservations that don't carry their own. `None` disables expiry.
    pub reservation_ttl: Option<Duration>,
    /// Thresholds for items created without explicit ones.
    pub default_thresholds: Thresholds,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            reservation_ttl: Some(DEFAULT_RESERVATION_TTL),
            default_thresholds: Thresholds::default(),
        }
    }
}

impl LedgerConfig {
    /// Defaults overlaid with the `STOCK_LEDGER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from an arbitrary key lookup.
    ///
    /// Unparsable values are logged and ignored. A TTL of `0` disables expiry; one
    /// above [`MAX_RESERVATION_TTL`] is ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(n) = parse_u64(&lookup, ENV_MAX_ATTEMPTS) {
            config.retry.max_attempts = u32::try_from(n).unwrap_or(u32::MAX);
        }
        if let Some(ms) = parse_u64(&lookup, ENV_INITIAL_BACKOFF_MS) {
            config.retry.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, ENV_MAX_BACKOFF_MS) {
            config.retry.max_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_u64(&lookup, ENV_RESERVATION_TTL_SECS) {
            let ttl = Duration::from_secs(secs);
            if ttl > MAX_RESERVATION_TTL {
                tracing::warn!(
                    key = ENV_RESERVATION_TTL_SECS,
                    secs,
                    max_secs = MAX_RESERVATION_TTL.as_secs(),
                    "ignoring out-of-range reservation ttl"
                );
            } else {
                config.reservation_ttl = (secs > 0).then_some(ttl);
            }
        }

        config
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_reservation_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_default_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.default_thresholds = thresholds;
        self
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, value = %raw, error = %err, "ignoring unparsable ledger setting");
            None
        }
    }
}
