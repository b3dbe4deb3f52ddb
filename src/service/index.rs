//! In-memory Trigger Index rebuilt from the authoritative store (§4.3).
//!
//! A `symbol → []Trigger` map with O(1) add/remove-by-entity-id and an
//! atomic full-rebuild swap. Triggers are derived, never persisted: this is
//! the only place that turns entity state into "what price should fire what."

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::domain::{EntityKind, Recommendation, Trigger, TriggerType, UserTrade};
use crate::port::store::{Store, TriggerPhase, TriggerSource};
use crate::Result;

type SymbolMap = HashMap<String, Vec<Trigger>>;

/// Flatten one [`TriggerSource`] into the triggers it contributes (§4.3
/// "Deriving triggers from state"). `profit_stop_enabled` is the
/// `RiskConfig` kill-switch: when `false`, no `PROFIT_STOP` trigger is ever
/// derived regardless of what the entity has configured.
fn triggers_for(source: &TriggerSource, profit_stop_enabled: bool) -> Vec<Trigger> {
    let base = |trigger_type: TriggerType, price: rust_decimal::Decimal, order_type| Trigger {
        entity_kind: source.entity_kind,
        entity_id: source.entity_id,
        owner_id: source.owner_id.clone(),
        symbol: source.symbol.clone(),
        side: source.side,
        trigger_type,
        price,
        order_type,
    };

    match source.phase {
        TriggerPhase::AwaitingEntry => {
            vec![base(TriggerType::Entry, source.entry_price, Some(source.order_type))]
        }
        TriggerPhase::Open => {
            let mut triggers = vec![base(TriggerType::Sl, source.stop_loss, None)];
            if profit_stop_enabled {
                if let Some(price) = source.profit_stop_price {
                    triggers.push(base(TriggerType::ProfitStop, price, None));
                }
            }
            for (index, price) in &source.targets {
                triggers.push(base(TriggerType::Tp(*index), *price, None));
            }
            triggers
        }
    }
}

/// Flattened view of a live Recommendation, for incremental index updates
/// without a round-trip back to the store (mirrors
/// [`crate::adapter::store::sqlite::SqliteStore::trigger_sources`]'s shape
/// for the recommendations half of that query).
fn recommendation_trigger_source(rec: &Recommendation) -> Option<TriggerSource> {
    let phase = match rec.status {
        crate::domain::RecommendationStatus::Pending => TriggerPhase::AwaitingEntry,
        crate::domain::RecommendationStatus::Active => TriggerPhase::Open,
        crate::domain::RecommendationStatus::Closed => return None,
    };
    Some(TriggerSource {
        entity_kind: EntityKind::Recommendation,
        entity_id: rec.id.value(),
        owner_id: rec.analyst_id.clone(),
        symbol: rec.symbol.clone(),
        side: rec.side,
        phase,
        entry_price: rec.entry_price,
        stop_loss: rec.stop_loss,
        targets: rec.targets.iter().enumerate().map(|(i, t)| (i as u32 + 1, t.price)).collect(),
        order_type: rec.order_type,
        profit_stop_price: rec.profit_stop.is_armed().then_some(rec.profit_stop.price).flatten(),
    })
}

/// Flattened view of a live UserTrade; mirrors `recommendation_trigger_source`.
fn user_trade_trigger_source(trade: &UserTrade) -> Option<TriggerSource> {
    let phase = match trade.status {
        crate::domain::UserTradeStatus::PendingActivation => TriggerPhase::AwaitingEntry,
        crate::domain::UserTradeStatus::Activated => TriggerPhase::Open,
        crate::domain::UserTradeStatus::Watchlist | crate::domain::UserTradeStatus::Closed => return None,
    };
    Some(TriggerSource {
        entity_kind: EntityKind::UserTrade,
        entity_id: trade.id.value(),
        owner_id: trade.user_id.to_string(),
        symbol: trade.symbol.clone(),
        side: trade.side,
        phase,
        entry_price: trade.entry_price,
        stop_loss: trade.stop_loss,
        targets: trade.targets.iter().enumerate().map(|(i, t)| (i as u32 + 1, t.price)).collect(),
        order_type: trade.order_type,
        profit_stop_price: trade.profit_stop.is_armed().then_some(trade.profit_stop.price).flatten(),
    })
}

/// The Trigger Index (§4.3). One instance shared (via `Arc`) between the
/// Lifecycle Service (incremental updates), the rebuild task (full swaps),
/// and the Alert Evaluator (reads).
pub struct TriggerIndex {
    store: Arc<dyn Store>,
    map: RwLock<SymbolMap>,
    profit_stop_enabled: bool,
}

impl TriggerIndex {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, profit_stop_enabled: bool) -> Self {
        Self { store, map: RwLock::new(HashMap::new()), profit_stop_enabled }
    }

    /// Lock-held copy of every trigger on `symbol`, for the Evaluator.
    #[must_use]
    pub fn snapshot(&self, symbol: &str) -> Vec<Trigger> {
        self.map.read().get(symbol).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.map.read().len()
    }

    /// Build fresh off-lock, then swap under a single exclusive lock so
    /// readers never observe a partially-built map (§4.3).
    pub async fn rebuild_from_store(&self) -> Result<()> {
        let sources = self.store.trigger_sources().await?;
        let mut fresh: SymbolMap = HashMap::new();
        for source in &sources {
            for trigger in triggers_for(source, self.profit_stop_enabled) {
                let bucket = fresh.entry(trigger.symbol.clone()).or_default();
                if !bucket.iter().any(|t: &Trigger| t.dedup_key() == trigger.dedup_key()) {
                    bucket.push(trigger);
                }
            }
        }
        let symbols = fresh.len();
        let triggers: usize = fresh.values().map(Vec::len).sum();
        *self.map.write() = fresh;
        info!(symbols, triggers, "trigger index rebuilt");
        Ok(())
    }

    /// Retry `rebuild_from_store` with exponential backoff (5s→60s cap, §4.3)
    /// on store failure. Runs as its own long-lived task (§5).
    pub async fn rebuild_with_retry(&self) {
        let mut delay = Duration::from_secs(5);
        loop {
            match self.rebuild_from_store().await {
                Ok(()) => return,
                Err(err) => {
                    warn!(error = %err, delay_secs = delay.as_secs(), "trigger index rebuild failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(60));
                }
            }
        }
    }

    /// Periodic full-rebuild loop, the Trigger Index's safety net against
    /// any lost incremental update (§4.3, §4.5 "Index rebuild is a safety net").
    pub async fn run_rebuild_loop(&self, interval_secs: u64, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => self.rebuild_with_retry().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Incremental add for one entity's current triggers, called by
    /// Lifecycle after a successful transition (§4.3).
    fn add_for(&self, source: &TriggerSource) {
        let triggers = triggers_for(source, self.profit_stop_enabled);
        if triggers.is_empty() {
            return;
        }
        let mut map = self.map.write();
        for trigger in triggers {
            let bucket = map.entry(trigger.symbol.clone()).or_default();
            bucket.retain(|t| t.dedup_key() != trigger.dedup_key());
            bucket.push(trigger);
        }
    }

    /// Incremental remove of every trigger belonging to one entity.
    pub fn remove_for(&self, entity_kind: EntityKind, entity_id: i64) {
        let mut map = self.map.write();
        for bucket in map.values_mut() {
            bucket.retain(|t| !(t.entity_kind == entity_kind && t.entity_id == entity_id));
        }
    }

    /// Replace a Recommendation's triggers with whatever its current status
    /// derives (possibly none, if closed). Called post-commit by Lifecycle.
    pub fn reindex_recommendation(&self, rec: &Recommendation) {
        self.remove_for(EntityKind::Recommendation, rec.id.value());
        if let Some(source) = recommendation_trigger_source(rec) {
            self.add_for(&source);
        }
    }

    /// UserTrade counterpart of [`Self::reindex_recommendation`].
    pub fn reindex_user_trade(&self, trade: &UserTrade) {
        self.remove_for(EntityKind::UserTrade, trade.id.value());
        if let Some(source) = user_trade_trigger_source(trade) {
            self.add_for(&source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::store::pool::{create_pool, run_migrations};
    use crate::adapter::store::sqlite::SqliteStore;
    use crate::domain::{ExitStrategy, NewRecommendation, OrderType, ProfitStop, Side, Target};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn new_rec() -> NewRecommendation {
        NewRecommendation {
            analyst_id: "analyst-1".to_string(),
            channel_id: None,
            symbol: "BTCUSDT".to_string(),
            side: Side::Long,
            entry_price: dec!(60000),
            stop_loss: dec!(59000),
            targets: vec![Target { price: dec!(61000), close_percent: dec!(100) }],
            order_type: OrderType::Limit,
            exit_strategy: ExitStrategy::CloseAtFinalTp,
            profit_stop: ProfitStop::disabled(),
        }
    }

    async fn store_with_one_pending() -> Arc<dyn Store> {
        let pool = create_pool(":memory:", 1).unwrap();
        run_migrations(&pool).unwrap();
        let store = SqliteStore::new(pool);
        let rec = store
            .create_recommendation(new_rec(), crate::domain::RecommendationStatus::Pending, None, crate::domain::EventKind::CreatedPending, Utc::now())
            .await
            .unwrap();
        store.clear_shadow(rec.id).await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn rebuild_derives_one_entry_trigger_for_pending() {
        let store = store_with_one_pending().await;
        let index = TriggerIndex::new(store, true);
        index.rebuild_from_store().await.unwrap();

        let triggers = index.snapshot("BTCUSDT");
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].trigger_type, TriggerType::Entry);
    }

    #[tokio::test]
    async fn reindex_after_activation_swaps_entry_for_sl_and_tp() {
        let store = store_with_one_pending().await;
        let index = TriggerIndex::new(Arc::clone(&store), true);
        index.rebuild_from_store().await.unwrap();

        let mut rec = store.get_recommendation(crate::domain::RecommendationId::new(1)).await.unwrap();
        let event = rec.activate(Utc::now()).unwrap();
        store.save_recommendation(&rec, event, Utc::now()).await.unwrap();
        index.reindex_recommendation(&rec);

        let mut triggers = index.snapshot("BTCUSDT");
        triggers.sort_by_key(|t| t.trigger_type.evaluation_rank());
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].trigger_type, TriggerType::Sl);
        assert_eq!(triggers[1].trigger_type, TriggerType::Tp(1));
    }

    #[tokio::test]
    async fn closed_entity_has_no_triggers() {
        let store = store_with_one_pending().await;
        let index = TriggerIndex::new(Arc::clone(&store), true);
        index.rebuild_from_store().await.unwrap();

        let mut rec = store.get_recommendation(crate::domain::RecommendationId::new(1)).await.unwrap();
        let event = rec.invalidate(dec!(59000), Utc::now()).unwrap();
        store.save_recommendation(&rec, event, Utc::now()).await.unwrap();
        index.reindex_recommendation(&rec);

        assert!(index.snapshot("BTCUSDT").is_empty());
    }

    #[tokio::test]
    async fn profit_stop_disabled_suppresses_trigger_even_when_armed() {
        let pool = create_pool(":memory:", 1).unwrap();
        run_migrations(&pool).unwrap();
        let store = SqliteStore::new(pool);
        let mut new = new_rec();
        new.profit_stop = crate::domain::ProfitStop {
            mode: crate::domain::ProfitStopMode::Fixed,
            price: Some(dec!(60500)),
            trailing_value: None,
            trailing_unit: None,
            active: true,
        };
        let rec = store
            .create_recommendation(new, crate::domain::RecommendationStatus::Active, Some(Utc::now()), crate::domain::EventKind::CreatedActive, Utc::now())
            .await
            .unwrap();
        store.clear_shadow(rec.id).await.unwrap();
        let store: Arc<dyn Store> = Arc::new(store);

        let index = TriggerIndex::new(store, false);
        index.rebuild_from_store().await.unwrap();
        let triggers = index.snapshot("BTCUSDT");
        assert!(triggers.iter().all(|t| t.trigger_type != TriggerType::ProfitStop));
    }
}
