//! Price Aggregator configuration (§4.2, §6).

use serde::Deserialize;

/// Symbol-set reconciliation cadence for the Price Aggregator.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    #[serde(default = "default_tick_channel_capacity")]
    pub tick_channel_capacity: usize,
}

const fn default_reconcile_interval_secs() -> u64 {
    60
}

const fn default_tick_channel_capacity() -> usize {
    1024
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval_secs(),
            tick_channel_capacity: default_tick_channel_capacity(),
        }
    }
}
