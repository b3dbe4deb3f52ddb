//! `check-config`: load the configuration and print an effective summary
//! without starting the engine.

use std::path::Path;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::Config;
use crate::Result;

#[derive(Tabled)]
struct Row {
    key: String,
    value: String,
}

impl Row {
    fn new(key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self { key: key.into(), value: value.to_string() }
    }
}

/// Load `path`, run validation, and print a human-readable table of the
/// settings that govern startup. Exits non-zero (via the propagated error)
/// on anything `Config::load` itself rejects.
pub fn execute(path: &Path) -> Result<()> {
    let config = Config::load(path)?;

    let rows = vec![
        Row::new("store.database_url", &config.store.database_url),
        Row::new("store.pool_size", config.store.pool_size),
        Row::new("exchange.market_data_provider", &config.exchange.market_data_provider),
        Row::new("exchange.backoff_base_ms", config.exchange.backoff_base_ms),
        Row::new("exchange.backoff_cap_ms", config.exchange.backoff_cap_ms),
        Row::new("exchange.circuit_breaker_threshold", config.exchange.circuit_breaker_threshold),
        Row::new("exchange.circuit_breaker_cooldown_secs", config.exchange.circuit_breaker_cooldown_secs),
        Row::new("evaluator.debounce_seconds", config.evaluator.debounce_seconds),
        Row::new("index.rebuild_interval_secs", config.index.rebuild_interval_secs),
        Row::new("aggregator.reconcile_interval_secs", config.aggregator.reconcile_interval_secs),
        Row::new("aggregator.tick_channel_capacity", config.aggregator.tick_channel_capacity),
        Row::new("risk.profit_stop_enabled", config.risk.profit_stop_enabled),
        Row::new("risk.breakeven_buffer_bps", config.risk.breakeven_buffer_bps),
        Row::new("notifier.enabled", config.notifier.enabled),
        Row::new("notifier.bot_username", &config.notifier.bot_username),
        Row::new("notifier.broadcast_channel_ids", config.notifier.broadcast_channel_ids.len()),
        Row::new("logging.level", &config.logging.level),
        Row::new("logging.format", &config.logging.format),
    ];

    println!("{}", Table::new(rows).with(Style::rounded()));
    println!("configuration is valid");
    Ok(())
}
