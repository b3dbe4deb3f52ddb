//! Application wiring (§5): builds every adapter and service from [`Config`]
//! and runs the long-lived background tasks until a shutdown signal fires.
//!
//! One task per exchange adapter lives inside [`PriceAggregator::ensure_watching`]
//! already; this module spawns the three top-level long-lived tasks named in
//! §5 ("Scheduling model") that sit above it: the aggregator reconciler, the
//! evaluator's tick-consumer loop, and the periodic Trigger Index rebuild.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, info_span, Instrument};

use crate::adapter::exchange::{BinanceFeed, BybitFeed};
use crate::adapter::notifier::LogNotifier;
use crate::adapter::store::pool::{create_pool, run_migrations};
use crate::adapter::store::sqlite::SqliteStore;
use crate::config::Config;
use crate::port::exchange::{ExchangeFeed, PriceLookup};
use crate::port::notifier::Notifier;
use crate::port::store::Store;
use crate::service::{AlertEvaluator, CreationService, LifecycleService, PriceAggregator, TriggerIndex};
use crate::Result;

#[cfg(feature = "telegram")]
use crate::adapter::notifier::{TelegramConfig, TelegramNotifier};

#[cfg(not(feature = "telegram"))]
use crate::adapter::notifier::NullNotifier;

/// Everything [`run`] built, handed back so a caller (tests, or a future
/// operator-facing surface) can drive Creation/Lifecycle directly instead of
/// only observing the background loops.
pub struct Engine {
    pub store: Arc<dyn Store>,
    pub index: Arc<TriggerIndex>,
    pub lifecycle: Arc<LifecycleService>,
    pub creation: Arc<CreationService>,
}

fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    if !config.notifier.enabled {
        return Ok(Arc::new(LogNotifier));
    }

    #[cfg(feature = "telegram")]
    {
        let token = config
            .notifier
            .bot_token
            .clone()
            .ok_or_else(|| crate::Error::Config("notifier.enabled requires TELOXIDE_TOKEN".to_string()))?;
        return Ok(Arc::new(TelegramNotifier::new(TelegramConfig { bot_token: token })));
    }

    #[cfg(not(feature = "telegram"))]
    {
        tracing::warn!("notifier.enabled is true but the telegram feature is not compiled in; using LogNotifier");
        Ok(Arc::new(NullNotifier))
    }
}

fn price_lookup_for(config: &Config, binance: &Arc<BinanceFeed>, bybit: &Arc<BybitFeed>) -> Arc<dyn PriceLookup> {
    match config.exchange.market_data_provider.to_uppercase().as_str() {
        "BYBIT" => bybit.clone(),
        _ => binance.clone(),
    }
}

/// Build the full engine and run its background loops until `shutdown` is
/// set to `true`. Returns once every spawned task has observed the signal.
pub async fn run(config: Config, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let pool = create_pool(&config.store.database_url, config.store.pool_size)?;
    run_migrations(&pool)?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));

    let index = Arc::new(TriggerIndex::new(store.clone(), config.risk.profit_stop_enabled));
    index.rebuild_with_retry().await;
    info!(symbols = index.symbol_count(), "trigger index built");

    let notifier = build_notifier(&config)?;

    let lifecycle = Arc::new(LifecycleService::new(
        store.clone(),
        index.clone(),
        notifier.clone(),
        config.risk.breakeven_buffer_bps,
        config.notifier.bot_username.clone(),
    ));

    let binance = Arc::new(BinanceFeed::new(
        config.exchange.backoff_base_ms,
        config.exchange.backoff_cap_ms,
        config.exchange.circuit_breaker_threshold,
        config.exchange.circuit_breaker_cooldown_secs,
    ));
    let bybit = Arc::new(BybitFeed::new(
        config.exchange.backoff_base_ms,
        config.exchange.backoff_cap_ms,
        config.exchange.circuit_breaker_threshold,
        config.exchange.circuit_breaker_cooldown_secs,
    ));
    let feeds: Vec<Arc<dyn ExchangeFeed>> = vec![binance.clone(), bybit.clone()];

    let aggregator = Arc::new(PriceAggregator::new(store.clone(), feeds, config.aggregator.tick_channel_capacity));
    aggregator.ensure_watching().await?;

    let evaluator = Arc::new(AlertEvaluator::new(index.clone(), lifecycle.clone(), config.evaluator.debounce_seconds));

    let price_lookup = price_lookup_for(&config, &binance, &bybit);
    let creation = Arc::new(CreationService::new(
        store.clone(),
        index.clone(),
        notifier.clone(),
        price_lookup,
        config.notifier.broadcast_channel_ids.clone(),
    ));

    let _engine = Engine { store: store.clone(), index: index.clone(), lifecycle: lifecycle.clone(), creation };

    let mut tasks = Vec::new();

    let reconcile_interval_secs = config.aggregator.reconcile_interval_secs;
    {
        let aggregator = aggregator.clone();
        let shutdown = shutdown.clone();
        tasks.push(tokio::spawn(
            async move { aggregator.run_reconciler(reconcile_interval_secs, shutdown).await }
                .instrument(info_span!("aggregator_reconciler")),
        ));
    }

    {
        let tick_rx = aggregator.subscribe();
        let evaluator = evaluator.clone();
        let shutdown = shutdown.clone();
        tasks.push(tokio::spawn(
            async move { evaluator.run(tick_rx, shutdown).await }.instrument(info_span!("evaluator")),
        ));
    }

    let rebuild_interval_secs = config.index.rebuild_interval_secs;
    {
        let index = index.clone();
        let shutdown = shutdown.clone();
        tasks.push(tokio::spawn(
            async move { index.run_rebuild_loop(rebuild_interval_secs, shutdown).await }
                .instrument(info_span!("index_rebuilder")),
        ));
    }

    shutdown.changed().await.ok();
    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}
