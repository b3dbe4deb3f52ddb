//! Lifecycle Service (§4.5): the only place that mutates a Recommendation or
//! UserTrade after creation.
//!
//! Every entry point re-reads the entity under a per-entity lock, re-checks
//! the precondition the transition requires, and persists entity + event in
//! one store call before updating the Trigger Index. Concurrent duplicate
//! dispatch (the same trigger firing twice before the first transition lands)
//! degrades to a no-op rather than a double transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::{
    CloseReason, DomainError, EntityKind, ExitStrategy, RecommendationId, RecommendationStatus,
    Side, Target, UserTradeId, UserTradeStatus,
};
use crate::port::exchange::Tick;
use crate::port::notifier::{Notifier, RecommendationCard};
use crate::port::store::Store;
use crate::service::index::TriggerIndex;
use crate::Result;

fn sl_touched(side: Side, stop_loss: Decimal, tick: &Tick) -> bool {
    match side {
        Side::Long => tick.low <= stop_loss,
        Side::Short => tick.high >= stop_loss,
    }
}

fn close_reason_text(reason: CloseReason) -> &'static str {
    match reason {
        CloseReason::ManualClose => "manually closed",
        CloseReason::SlHit => "stop-loss hit",
        CloseReason::AutoCloseFinalTp => "final target hit",
        CloseReason::ClosedViaPartial => "residual size exhausted",
        CloseReason::ProfitStopHit => "profit-stop hit",
    }
}

/// The Lifecycle Service (§4.5). One instance shared across the Evaluator,
/// Creation Service, and any operator-facing command surface.
pub struct LifecycleService {
    store: Arc<dyn Store>,
    index: Arc<TriggerIndex>,
    notifier: Arc<dyn Notifier>,
    locks: DashMap<(EntityKind, i64), Arc<Mutex<()>>>,
    breakeven_buffer_bps: Decimal,
    bot_username: String,
}

impl LifecycleService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        index: Arc<TriggerIndex>,
        notifier: Arc<dyn Notifier>,
        breakeven_buffer_bps: Decimal,
        bot_username: String,
    ) -> Self {
        Self { store, index, notifier, locks: DashMap::new(), breakeven_buffer_bps, bot_username }
    }

    /// Per-`(entity_kind, entity_id)` mutex substituting for row-level DB
    /// locking, which the `Store` trait has no primitive for (§5).
    async fn lock(&self, kind: EntityKind, id: i64) -> tokio::sync::OwnedMutexGuard<()> {
        let mutex = self.locks.entry((kind, id)).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        mutex.lock_owned().await
    }

    // -- Evaluator dispatch entry points --

    pub async fn on_entry_hit(&self, kind: EntityKind, id: i64, tick: &Tick) -> Result<()> {
        match kind {
            EntityKind::Recommendation => self.activate_recommendation(RecommendationId::new(id), tick).await,
            EntityKind::UserTrade => self.activate_user_trade(UserTradeId::new(id), tick).await,
        }
    }

    pub async fn on_sl_hit(&self, kind: EntityKind, id: i64, exit_price: Decimal, now: DateTime<Utc>) -> Result<()> {
        match kind {
            EntityKind::Recommendation => self.close_recommendation(RecommendationId::new(id), CloseReason::SlHit, exit_price, now).await,
            EntityKind::UserTrade => self.close_user_trade(UserTradeId::new(id), CloseReason::SlHit, exit_price, now).await,
        }
    }

    pub async fn on_profit_stop_hit(&self, kind: EntityKind, id: i64, exit_price: Decimal, now: DateTime<Utc>) -> Result<()> {
        match kind {
            EntityKind::Recommendation => self.close_recommendation(RecommendationId::new(id), CloseReason::ProfitStopHit, exit_price, now).await,
            EntityKind::UserTrade => self.close_user_trade(UserTradeId::new(id), CloseReason::ProfitStopHit, exit_price, now).await,
        }
    }

    pub async fn on_tp_hit(&self, kind: EntityKind, id: i64, index: u32, exit_price: Decimal, now: DateTime<Utc>) -> Result<()> {
        match kind {
            EntityKind::Recommendation => self.tp_hit_recommendation(RecommendationId::new(id), index, exit_price, now).await,
            EntityKind::UserTrade => self.tp_hit_user_trade(UserTradeId::new(id), index, exit_price, now).await,
        }
    }

    // -- Recommendation transitions --

    /// `PENDING → ACTIVE`, or `PENDING → CLOSED` if the SL was touched first
    /// (§4.4 "SL-before-entry"; a PENDING entity only has an ENTRY trigger in
    /// the index, so that race is checked here against the entity's own
    /// stop-loss rather than via a second trigger).
    pub async fn activate_recommendation(&self, id: RecommendationId, tick: &Tick) -> Result<()> {
        let _guard = self.lock(EntityKind::Recommendation, id.value()).await;
        let mut rec = self.store.get_recommendation(id).await?;
        if rec.status != RecommendationStatus::Pending {
            return Ok(());
        }
        let now = tick.received_at;
        if sl_touched(rec.side, rec.stop_loss, tick) {
            let event = rec.invalidate(rec.stop_loss, now)?;
            self.store.save_recommendation(&rec, event, now).await?;
            self.index.reindex_recommendation(&rec);
            self.notify_recommendation_event(&rec, "invalidated: stop-loss touched before entry").await;
        } else {
            let event = rec.activate(now)?;
            self.store.save_recommendation(&rec, event, now).await?;
            self.index.reindex_recommendation(&rec);
            self.notify_recommendation_event(&rec, "activated").await;
        }
        Ok(())
    }

    /// TP hit, with cascading partial close and possible final close (§4.5).
    /// Guarded by the event log, not just entity status: a duplicate dispatch
    /// of an already-recorded `TP{n}_HIT` is a silent no-op (§8.5).
    pub async fn tp_hit_recommendation(&self, id: RecommendationId, index: u32, exit_price: Decimal, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::Recommendation, id.value()).await;
        if self.store.has_recommendation_event(id, &format!("TP{index}_HIT")).await? {
            return Ok(());
        }
        let mut rec = self.store.get_recommendation(id).await?;
        if rec.status != RecommendationStatus::Active {
            return Ok(());
        }

        let event = rec.record_tp_hit(index, now);
        self.store.save_recommendation(&rec, event, now).await?;
        self.notify_recommendation_event(&rec, &format!("target {index} hit")).await;

        if let Some(close_percent) = rec.targets.get((index - 1) as usize).map(|t| t.close_percent) {
            if close_percent > Decimal::ZERO {
                let event = rec.partial_close(close_percent, exit_price, now)?;
                self.store.save_recommendation(&rec, event, now).await?;
                self.notify_recommendation_event(&rec, &format!("partial close {close_percent}% at target {index}")).await;
            }
        }

        let is_final_target = rec.final_target_index() == Some(index);
        let mut closed_reason = None;
        if is_final_target && rec.exit_strategy == ExitStrategy::CloseAtFinalTp {
            let event = rec.close(CloseReason::AutoCloseFinalTp, exit_price, now);
            self.store.save_recommendation(&rec, event, now).await?;
            closed_reason = Some(CloseReason::AutoCloseFinalTp);
        } else if rec.is_residual_closeable() {
            let event = rec.close(CloseReason::ClosedViaPartial, exit_price, now);
            self.store.save_recommendation(&rec, event, now).await?;
            closed_reason = Some(CloseReason::ClosedViaPartial);
        }
        self.index.reindex_recommendation(&rec);
        if let Some(reason) = closed_reason {
            self.notify_recommendation_event(&rec, &format!("closed: {}", close_reason_text(reason))).await;
        }
        Ok(())
    }

    /// `ACTIVE → CLOSED` for SL/profit-stop hits and manual closes. Already-closed
    /// is a no-op rather than an error (§8 "concurrent close race").
    pub async fn close_recommendation(&self, id: RecommendationId, reason: CloseReason, exit_price: Decimal, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::Recommendation, id.value()).await;
        let mut rec = self.store.get_recommendation(id).await?;
        if rec.status == RecommendationStatus::Closed {
            return Ok(());
        }
        if rec.status != RecommendationStatus::Active {
            return Err(crate::domain::DomainError::NotActive.into());
        }
        let event = rec.close(reason, exit_price, now);
        self.store.save_recommendation(&rec, event, now).await?;
        self.index.reindex_recommendation(&rec);
        self.notify_recommendation_event(&rec, &format!("closed: {}", close_reason_text(reason))).await;
        Ok(())
    }

    pub async fn update_stop_loss_recommendation(&self, id: RecommendationId, new_sl: Decimal, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::Recommendation, id.value()).await;
        let mut rec = self.store.get_recommendation(id).await?;
        let event = rec.update_stop_loss(new_sl, now)?;
        self.store.save_recommendation(&rec, event, now).await?;
        self.index.reindex_recommendation(&rec);
        self.notify_recommendation_event(&rec, &format!("stop-loss updated to {new_sl}")).await;
        Ok(())
    }

    pub async fn update_entry_recommendation(&self, id: RecommendationId, new_entry: Decimal, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::Recommendation, id.value()).await;
        let mut rec = self.store.get_recommendation(id).await?;
        let event = rec.update_entry(new_entry, now)?;
        self.store.save_recommendation(&rec, event, now).await?;
        self.index.reindex_recommendation(&rec);
        self.notify_recommendation_event(&rec, &format!("entry updated to {new_entry}")).await;
        Ok(())
    }

    pub async fn update_targets_recommendation(&self, id: RecommendationId, targets: Vec<Target>, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::Recommendation, id.value()).await;
        let mut rec = self.store.get_recommendation(id).await?;
        let event = rec.update_targets(targets, now)?;
        self.store.save_recommendation(&rec, event, now).await?;
        self.index.reindex_recommendation(&rec);
        self.notify_recommendation_event(&rec, "targets updated").await;
        Ok(())
    }

    pub async fn set_exit_strategy_recommendation(&self, id: RecommendationId, strategy: ExitStrategy, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::Recommendation, id.value()).await;
        let mut rec = self.store.get_recommendation(id).await?;
        let event = rec.set_exit_strategy(strategy, now);
        self.store.save_recommendation(&rec, event, now).await?;
        self.notify_recommendation_event(&rec, "exit strategy updated").await;
        Ok(())
    }

    pub async fn move_sl_to_breakeven_recommendation(&self, id: RecommendationId, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::Recommendation, id.value()).await;
        let mut rec = self.store.get_recommendation(id).await?;
        let event = rec.move_sl_to_breakeven(self.breakeven_buffer_bps, now)?;
        self.store.save_recommendation(&rec, event, now).await?;
        self.index.reindex_recommendation(&rec);
        self.notify_recommendation_event(&rec, "stop-loss moved to break-even").await;
        Ok(())
    }

    // -- UserTrade transitions (mirror the Recommendation methods above) --

    pub async fn activate_user_trade(&self, id: UserTradeId, tick: &Tick) -> Result<()> {
        let _guard = self.lock(EntityKind::UserTrade, id.value()).await;
        let mut trade = self.store.get_user_trade(id).await?;
        if trade.status != UserTradeStatus::PendingActivation {
            return Ok(());
        }
        let now = tick.received_at;
        if sl_touched(trade.side, trade.stop_loss, tick) {
            let event = trade.invalidate(trade.stop_loss, now)?;
            self.store.save_user_trade(&trade, event, now).await?;
            self.index.reindex_user_trade(&trade);
            self.notify_user_trade_event(&trade, "invalidated: stop-loss touched before entry").await;
        } else {
            let event = trade.activate(now)?;
            self.store.save_user_trade(&trade, event, now).await?;
            self.index.reindex_user_trade(&trade);
            self.notify_user_trade_event(&trade, "activated").await;
        }
        Ok(())
    }

    pub async fn tp_hit_user_trade(&self, id: UserTradeId, index: u32, exit_price: Decimal, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::UserTrade, id.value()).await;
        if self.store.has_user_trade_event(id, &format!("TP{index}_HIT")).await? {
            return Ok(());
        }
        let mut trade = self.store.get_user_trade(id).await?;
        if trade.status != UserTradeStatus::Activated {
            return Ok(());
        }

        let event = trade.record_tp_hit(index, now);
        self.store.save_user_trade(&trade, event, now).await?;
        self.notify_user_trade_event(&trade, &format!("target {index} hit")).await;

        if let Some(close_percent) = trade.targets.get((index - 1) as usize).map(|t| t.close_percent) {
            if close_percent > Decimal::ZERO {
                let event = trade.partial_close(close_percent, exit_price, now)?;
                self.store.save_user_trade(&trade, event, now).await?;
                self.notify_user_trade_event(&trade, &format!("partial close {close_percent}% at target {index}")).await;
            }
        }

        let is_final_target = trade.final_target_index() == Some(index);
        let mut closed_reason = None;
        if is_final_target && trade.exit_strategy == ExitStrategy::CloseAtFinalTp {
            let event = trade.close(CloseReason::AutoCloseFinalTp, exit_price, now);
            self.store.save_user_trade(&trade, event, now).await?;
            closed_reason = Some(CloseReason::AutoCloseFinalTp);
        } else if trade.is_residual_closeable() {
            let event = trade.close(CloseReason::ClosedViaPartial, exit_price, now);
            self.store.save_user_trade(&trade, event, now).await?;
            closed_reason = Some(CloseReason::ClosedViaPartial);
        }
        self.index.reindex_user_trade(&trade);
        if let Some(reason) = closed_reason {
            self.notify_user_trade_event(&trade, &format!("closed: {}", close_reason_text(reason))).await;
        }
        Ok(())
    }

    pub async fn close_user_trade(&self, id: UserTradeId, reason: CloseReason, exit_price: Decimal, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::UserTrade, id.value()).await;
        let mut trade = self.store.get_user_trade(id).await?;
        if trade.status == UserTradeStatus::Closed {
            return Ok(());
        }
        if trade.status != UserTradeStatus::Activated {
            return Err(crate::domain::DomainError::NotActive.into());
        }
        let event = trade.close(reason, exit_price, now);
        self.store.save_user_trade(&trade, event, now).await?;
        self.index.reindex_user_trade(&trade);
        self.notify_user_trade_event(&trade, &format!("closed: {}", close_reason_text(reason))).await;
        Ok(())
    }

    pub async fn update_stop_loss_user_trade(&self, id: UserTradeId, new_sl: Decimal, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::UserTrade, id.value()).await;
        let mut trade = self.store.get_user_trade(id).await?;
        let event = trade.update_stop_loss(new_sl, now)?;
        self.store.save_user_trade(&trade, event, now).await?;
        self.index.reindex_user_trade(&trade);
        self.notify_user_trade_event(&trade, &format!("stop-loss updated to {new_sl}")).await;
        Ok(())
    }

    pub async fn update_entry_user_trade(&self, id: UserTradeId, new_entry: Decimal, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::UserTrade, id.value()).await;
        let mut trade = self.store.get_user_trade(id).await?;
        let event = trade.update_entry(new_entry, now)?;
        self.store.save_user_trade(&trade, event, now).await?;
        self.index.reindex_user_trade(&trade);
        self.notify_user_trade_event(&trade, &format!("entry updated to {new_entry}")).await;
        Ok(())
    }

    pub async fn update_targets_user_trade(&self, id: UserTradeId, targets: Vec<Target>, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::UserTrade, id.value()).await;
        let mut trade = self.store.get_user_trade(id).await?;
        let event = trade.update_targets(targets, now)?;
        self.store.save_user_trade(&trade, event, now).await?;
        self.index.reindex_user_trade(&trade);
        self.notify_user_trade_event(&trade, "targets updated").await;
        Ok(())
    }

    pub async fn set_exit_strategy_user_trade(&self, id: UserTradeId, strategy: ExitStrategy, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::UserTrade, id.value()).await;
        let mut trade = self.store.get_user_trade(id).await?;
        let event = trade.set_exit_strategy(strategy, now);
        self.store.save_user_trade(&trade, event, now).await?;
        self.notify_user_trade_event(&trade, "exit strategy updated").await;
        Ok(())
    }

    pub async fn move_sl_to_breakeven_user_trade(&self, id: UserTradeId, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock(EntityKind::UserTrade, id.value()).await;
        let mut trade = self.store.get_user_trade(id).await?;
        let event = trade.move_sl_to_breakeven(self.breakeven_buffer_bps, now)?;
        self.store.save_user_trade(&trade, event, now).await?;
        self.index.reindex_user_trade(&trade);
        self.notify_user_trade_event(&trade, "stop-loss moved to break-even").await;
        Ok(())
    }

    // -- Notification helpers --

    /// No-op while `is_shadow`: the Creation Service's background publish
    /// task hasn't posted any cards yet, so there is nothing to edit (§4.7).
    async fn notify_recommendation_event(&self, rec: &crate::domain::Recommendation, text: &str) {
        if rec.is_shadow {
            return;
        }
        let messages = match self.store.list_published_messages(rec.id).await {
            Ok(messages) => messages,
            Err(err) => {
                warn!(recommendation_id = rec.id.value(), error = %err, "failed to list published messages");
                return;
            }
        };
        let card = RecommendationCard::from(rec);
        for message in messages {
            let channel_id = message.channel_id.to_string();
            if let Err(err) = self.notifier.edit_card(&channel_id, &message.message_id, &card, &self.bot_username).await {
                warn!(recommendation_id = rec.id.value(), channel_id, error = %err, "failed to edit card");
            }
            if let Err(err) = self.notifier.post_reply(&channel_id, &message.message_id, text).await {
                warn!(recommendation_id = rec.id.value(), channel_id, error = %err, "failed to post reply");
            }
        }
    }

    async fn notify_user_trade_event(&self, trade: &crate::domain::UserTrade, text: &str) {
        if let Err(err) = self.notifier.send_private_text(&trade.user_id.to_string(), text).await {
            warn!(user_trade_id = trade.id.value(), error = %err, "failed to send private text");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::notifier::NullNotifier;
    use crate::adapter::store::pool::{create_pool, run_migrations};
    use crate::adapter::store::sqlite::SqliteStore;
    use crate::domain::{EventKind, NewRecommendation, OrderType, ProfitStop};
    use crate::port::exchange::Source;
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

    async fn service_with_one_pending() -> (LifecycleService, Arc<dyn Store>) {
        let pool = create_pool(":memory:", 1).unwrap();
        run_migrations(&pool).unwrap();
        let store = SqliteStore::new(pool);
        let rec = store
            .create_recommendation(new_rec(), RecommendationStatus::Pending, None, EventKind::CreatedPending, Utc::now())
            .await
            .unwrap();
        store.clear_shadow(rec.id).await.unwrap();
        let store: Arc<dyn Store> = Arc::new(store);
        let index = Arc::new(TriggerIndex::new(Arc::clone(&store), true));
        index.rebuild_from_store().await.unwrap();
        let service = LifecycleService::new(Arc::clone(&store), index, Arc::new(NullNotifier), dec!(5), "bot".to_string());
        (service, store)
    }

    fn tick(low: Decimal, high: Decimal) -> Tick {
        Tick {
            symbol: "BTCUSDT".to_string(),
            market: crate::port::exchange::MarketType::Spot,
            low,
            high,
            source: Source::Binance,
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn entry_tick_activates_pending_recommendation() {
        let (service, store) = service_with_one_pending().await;
        service.activate_recommendation(RecommendationId::new(1), &tick(dec!(60000), dec!(60100))).await.unwrap();

        let rec = store.get_recommendation(RecommendationId::new(1)).await.unwrap();
        assert_eq!(rec.status, RecommendationStatus::Active);
    }

    #[tokio::test]
    async fn sl_touched_before_entry_invalidates_instead_of_activating() {
        // §8 end-to-end scenario 2, exercised through the Lifecycle Service.
        let (service, store) = service_with_one_pending().await;
        service.activate_recommendation(RecommendationId::new(1), &tick(dec!(58900), dec!(59500))).await.unwrap();

        let rec = store.get_recommendation(RecommendationId::new(1)).await.unwrap();
        assert_eq!(rec.status, RecommendationStatus::Closed);
        assert_eq!(rec.exit_price, Some(dec!(59000)));
    }

    #[tokio::test]
    async fn final_tp_hit_cascades_to_close() {
        let (service, store) = service_with_one_pending().await;
        let now = Utc::now();
        service.activate_recommendation(RecommendationId::new(1), &tick(dec!(60000), dec!(60100))).await.unwrap();
        service.tp_hit_recommendation(RecommendationId::new(1), 1, dec!(61000), now).await.unwrap();

        let rec = store.get_recommendation(RecommendationId::new(1)).await.unwrap();
        assert_eq!(rec.status, RecommendationStatus::Closed);
        assert_eq!(rec.open_size_percent, Decimal::ZERO);
    }

    #[tokio::test]
    async fn duplicate_tp_hit_dispatch_is_idempotent() {
        let (service, store) = service_with_one_pending().await;
        let now = Utc::now();
        service.activate_recommendation(RecommendationId::new(1), &tick(dec!(60000), dec!(60100))).await.unwrap();
        service.tp_hit_recommendation(RecommendationId::new(1), 1, dec!(61000), now).await.unwrap();
        // Second dispatch of the same trigger must not double-close or error.
        service.tp_hit_recommendation(RecommendationId::new(1), 1, dec!(61000), now).await.unwrap();

        let rec = store.get_recommendation(RecommendationId::new(1)).await.unwrap();
        assert_eq!(rec.status, RecommendationStatus::Closed);
    }

    #[tokio::test]
    async fn concurrent_close_race_is_a_noop_not_an_error() {
        // §8 end-to-end scenario 6.
        let (service, _store) = service_with_one_pending().await;
        service.activate_recommendation(RecommendationId::new(1), &tick(dec!(60000), dec!(60100))).await.unwrap();
        service.close_recommendation(RecommendationId::new(1), CloseReason::SlHit, dec!(59000), Utc::now()).await.unwrap();
        service.close_recommendation(RecommendationId::new(1), CloseReason::SlHit, dec!(59000), Utc::now()).await.unwrap();
    }

    #[tokio::test]
    async fn break_even_move_uses_configured_buffer() {
        let (service, store) = service_with_one_pending().await;
        service.activate_recommendation(RecommendationId::new(1), &tick(dec!(60000), dec!(60100))).await.unwrap();
        service.move_sl_to_breakeven_recommendation(RecommendationId::new(1), Utc::now()).await.unwrap();

        let rec = store.get_recommendation(RecommendationId::new(1)).await.unwrap();
        assert_eq!(rec.stop_loss, dec!(60030));
    }
}
