//! Layered application configuration (§10.3).
//!
//! Secrets (`database_url`, `TELOXIDE_TOKEN`) are loaded from the environment
//! via `dotenvy`; everything else comes from a `config.toml` file, matching
//! the teacher's `dotenvy` + `toml` + nested-struct layering.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

mod aggregator;
mod evaluator;
mod exchange;
mod index;
mod logging;
mod notifier;
mod risk;
mod store;

pub use aggregator::AggregatorConfig;
pub use evaluator::EvaluatorConfig;
pub use exchange::ExchangeConfig;
pub use index::IndexConfig;
pub use logging::LoggingConfig;
pub use notifier::NotifierConfig;
pub use risk::RiskConfig;
pub use store::StoreConfig;

/// Root configuration object, matching the §6 options table one sub-struct
/// per concern.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load `dotenvy` secrets, then the TOML file at `path`, then validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file: {e}")))?;

        let mut config: Config =
            toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;

        config.store.database_url = std::env::var("DATABASE_URL").unwrap_or(config.store.database_url);
        config.notifier.bot_token = std::env::var("TELOXIDE_TOKEN").ok();

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.store.database_url.is_empty() {
            return Err(Error::Config("store.database_url cannot be empty".into()));
        }
        if self.evaluator.debounce_seconds < 0.0 {
            return Err(Error::Config("evaluator.debounce_seconds must be >= 0".into()));
        }
        if self.exchange.backoff_cap_ms < self.exchange.backoff_base_ms {
            return Err(Error::Config("exchange.backoff_cap_ms must be >= backoff_base_ms".into()));
        }
        if self.notifier.enabled && self.notifier.bot_token.is_none() {
            return Err(Error::Config("notifier.enabled requires TELOXIDE_TOKEN".into()));
        }
        Ok(())
    }

    /// Initialize logging with the configured settings (§10.2).
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            exchange: ExchangeConfig::default(),
            evaluator: EvaluatorConfig::default(),
            index: IndexConfig::default(),
            aggregator: AggregatorConfig::default(),
            risk: RiskConfig::default(),
            notifier: NotifierConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn notifier_enabled_without_token_fails_validation() {
        let mut config = Config::default();
        config.notifier.enabled = true;
        assert!(config.validate().is_err());
    }
}
