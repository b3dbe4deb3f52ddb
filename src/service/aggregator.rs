//! Price Aggregator (§4.2): fans exchange ticks out to whatever is currently
//! being watched, and keeps the watched symbol set in sync with the Trigger
//! Index's idea of "what has a live trigger."

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tracing::{info, warn};

use crate::port::exchange::{ExchangeFeed, Tick};
use crate::port::store::Store;
use crate::Result;

/// Fans exchange ticks out over a lossy-newest broadcast channel (§5 "tick
/// channel policy": a slow evaluator drops old ticks rather than back-pressuring
/// the feed) and keeps feeds subscribed only to symbols with live triggers.
pub struct PriceAggregator {
    store: Arc<dyn Store>,
    feeds: Vec<Arc<dyn ExchangeFeed>>,
    tick_tx: broadcast::Sender<Tick>,
    watched: Mutex<HashSet<String>>,
    generation: Mutex<watch::Sender<bool>>,
}

impl PriceAggregator {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, feeds: Vec<Arc<dyn ExchangeFeed>>, tick_channel_capacity: usize) -> Self {
        let (tick_tx, _) = broadcast::channel(tick_channel_capacity);
        let (generation_tx, _) = watch::channel(false);
        Self { store, feeds, tick_tx, watched: Mutex::new(HashSet::new()), generation: Mutex::new(generation_tx) }
    }

    /// New receivers see only ticks sent after they subscribed; the Alert
    /// Evaluator is expected to subscribe once at startup and hold the handle.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Tick> {
        self.tick_tx.subscribe()
    }

    /// Recompute the required symbol set from the store and, if it changed,
    /// cancel the previous generation of feed tasks and spawn a fresh one per
    /// feed subscribed to the new set (§4.2 "re-derives watch list").
    pub async fn ensure_watching(&self) -> Result<()> {
        let sources = self.store.trigger_sources().await?;
        let required: HashSet<String> = sources.into_iter().map(|s| s.symbol).collect();

        let mut watched = self.watched.lock().await;
        if *watched == required {
            return Ok(());
        }
        info!(symbols = required.len(), "watch list changed, relaunching feed tasks");

        let (new_tx, _) = watch::channel(false);
        let mut generation = self.generation.lock().await;
        let old_tx = std::mem::replace(&mut *generation, new_tx.clone());
        let _ = old_tx.send(true);

        for feed in &self.feeds {
            let feed = Arc::clone(feed);
            let symbols = required.clone();
            let tick_tx = self.tick_tx.clone();
            let shutdown = new_tx.subscribe();
            tokio::spawn(async move {
                let handler: crate::port::exchange::TickHandler = Arc::new(move |tick: Tick| {
                    let _ = tick_tx.send(tick);
                });
                if let Err(err) = feed.stream(symbols, handler, shutdown).await {
                    warn!(source = feed.source().label(), error = %err, "exchange feed stream ended with error");
                }
            });
        }

        *watched = required;
        Ok(())
    }

    /// Periodic reconciliation loop (§4.2, §5): re-derive the watch list on
    /// an interval so a store write outside the Lifecycle Service's own
    /// incremental path (e.g. a manual DB fix) is still picked up.
    pub async fn run_reconciler(&self, interval_secs: u64, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.ensure_watching().await {
                        warn!(error = %err, "aggregator reconcile failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::store::pool::{create_pool, run_migrations};
    use crate::adapter::store::sqlite::SqliteStore;
    use crate::domain::{EventKind, ExitStrategy, NewRecommendation, OrderType, ProfitStop, RecommendationStatus, Side, Target};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn new_rec(symbol: &str) -> NewRecommendation {
        NewRecommendation {
            analyst_id: "analyst-1".to_string(),
            channel_id: None,
            symbol: symbol.to_string(),
            side: Side::Long,
            entry_price: dec!(100),
            stop_loss: dec!(95),
            targets: vec![Target { price: dec!(110), close_percent: dec!(100) }],
            order_type: OrderType::Limit,
            exit_strategy: ExitStrategy::CloseAtFinalTp,
            profit_stop: ProfitStop::disabled(),
        }
    }

    #[tokio::test]
    async fn ensure_watching_is_a_noop_when_symbol_set_is_unchanged() {
        let pool = create_pool(":memory:", 1).unwrap();
        run_migrations(&pool).unwrap();
        let store = SqliteStore::new(pool);
        let rec = store
            .create_recommendation(new_rec("BTCUSDT"), RecommendationStatus::Pending, None, EventKind::CreatedPending, Utc::now())
            .await
            .unwrap();
        store.clear_shadow(rec.id).await.unwrap();
        let store: Arc<dyn Store> = Arc::new(store);

        let aggregator = PriceAggregator::new(store, vec![], 16);
        aggregator.ensure_watching().await.unwrap();
        assert_eq!(aggregator.watched.lock().await.len(), 1);
        aggregator.ensure_watching().await.unwrap();
        assert_eq!(aggregator.watched.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn subscribe_receives_ticks_sent_after_subscription() {
        let store: Arc<dyn Store> = {
            let pool = create_pool(":memory:", 1).unwrap();
            run_migrations(&pool).unwrap();
            Arc::new(SqliteStore::new(pool))
        };
        let aggregator = PriceAggregator::new(store, vec![], 16);
        let mut rx = aggregator.subscribe();
        aggregator.tick_tx.send(Tick {
            symbol: "BTCUSDT".to_string(),
            market: crate::port::exchange::MarketType::Spot,
            low: dec!(99),
            high: dec!(101),
            source: crate::port::exchange::Source::Binance,
            received_at: Utc::now(),
        }).unwrap();
        let tick = rx.recv().await.unwrap();
        assert_eq!(tick.symbol, "BTCUSDT");
    }
}
