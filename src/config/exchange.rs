//! Exchange adapter configuration (§4.1, §6).

use serde::Deserialize;

fn default_market_data_provider() -> String {
    "BINANCE".to_string()
}

/// Reconnect/backoff tuning for every [`crate::port::ExchangeFeed`].
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Primary exchange for symbol validation; the secondary is tried if the
    /// primary is geo-blocked.
    #[serde(default = "default_market_data_provider")]
    pub market_data_provider: String,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    #[serde(default = "default_circuit_breaker_cooldown_secs")]
    pub circuit_breaker_cooldown_secs: u64,
}

const fn default_backoff_base_ms() -> u64 {
    1_000
}

const fn default_backoff_cap_ms() -> u64 {
    30_000
}

const fn default_circuit_breaker_threshold() -> u32 {
    5
}

const fn default_circuit_breaker_cooldown_secs() -> u64 {
    60
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            market_data_provider: default_market_data_provider(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_cooldown_secs: default_circuit_breaker_cooldown_secs(),
        }
    }
}
