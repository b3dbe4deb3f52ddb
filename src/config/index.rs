//! Trigger Index configuration (§4.3, §6).

use serde::Deserialize;

/// Full-rebuild cadence for the Trigger Index.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_rebuild_interval_secs")]
    pub rebuild_interval_secs: u64,
}

const fn default_rebuild_interval_secs() -> u64 {
    300
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { rebuild_interval_secs: default_rebuild_interval_secs() }
    }
}
