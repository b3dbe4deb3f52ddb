//! Authoritative store configuration.

use serde::Deserialize;

fn default_database_url() -> String {
    "signalkeeper.db".to_string()
}

/// Connection string and pool sizing for the SQLite-backed store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

const fn default_pool_size() -> u32 {
    8
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { database_url: default_database_url(), pool_size: default_pool_size() }
    }
}
