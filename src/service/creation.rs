//! Creation Service (§4.7): the only place new Recommendations and
//! UserTrades come into existence.
//!
//! Recommendations use a shadow-then-publish protocol: validate, persist with
//! `is_shadow=true`, return immediately, then finish broadcasting and
//! indexing in a detached background task. This decouples the caller from
//! Notifier latency while guaranteeing the entity is never observable as
//! "publishable but unindexed" (§4.7, §5).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::{
    ChannelId, DomainError, EventKind, NewRecommendation, NewUserTrade, OrderType,
    PublishedMessage, Recommendation, RecommendationId, RecommendationStatus, UserId, UserTrade,
    UserTradeId, UserTradeStatus,
};
use crate::port::exchange::PriceLookup;
use crate::port::notifier::{Keyboard, Notifier, RecommendationCard};
use crate::port::store::Store;
use crate::service::index::TriggerIndex;
use crate::Result;

/// Details of the chat the forwarded-content UserTrade was sourced from, used
/// to resolve (or create) its [`crate::domain::WatchedChannel`] (§4.7).
#[derive(Debug, Clone)]
pub struct SourceChannel {
    pub telegram_channel_id: String,
    pub channel_title: Option<String>,
}

/// Validates & persists new Recommendations and UserTrades (§4.7).
pub struct CreationService {
    store: Arc<dyn Store>,
    index: Arc<TriggerIndex>,
    notifier: Arc<dyn Notifier>,
    price_lookup: Arc<dyn PriceLookup>,
    broadcast_channel_ids: Vec<ChannelId>,
}

impl CreationService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        index: Arc<TriggerIndex>,
        notifier: Arc<dyn Notifier>,
        price_lookup: Arc<dyn PriceLookup>,
        broadcast_channel_ids: Vec<i64>,
    ) -> Self {
        Self {
            store,
            index,
            notifier,
            price_lookup,
            broadcast_channel_ids: broadcast_channel_ids.into_iter().map(ChannelId::new).collect(),
        }
    }

    /// Shadow-then-publish creation for analyst-authored Recommendations
    /// (§4.7 steps 1-3). Returns as soon as the shadow row is committed; the
    /// publish/index/clear-shadow sequence continues on a detached task.
    pub async fn create_recommendation(&self, mut new: NewRecommendation, now: DateTime<Utc>) -> Result<Recommendation> {
        new.validate()?;
        if new.order_type == OrderType::Market {
            new.entry_price = self.price_lookup.latest_price(&new.symbol).await?;
            new.validate()?;
        }

        let (status, activated_at, created_event) = if new.order_type == OrderType::Market {
            (RecommendationStatus::Active, Some(now), EventKind::CreatedActive)
        } else {
            (RecommendationStatus::Pending, None, EventKind::CreatedPending)
        };

        let mut channels = self.broadcast_channel_ids.clone();
        if let Some(origin) = new.channel_id {
            if !channels.contains(&origin) {
                channels.push(origin);
            }
        }

        let rec = self.store.create_recommendation(new, status, activated_at, created_event, now).await?;

        let store = self.store.clone();
        let index = self.index.clone();
        let notifier = self.notifier.clone();
        let rec_id = rec.id;
        tokio::spawn(async move {
            publish_recommendation(store, index, notifier, rec_id, channels).await;
        });

        Ok(rec)
    }

    /// UserTrade creation from forwarded content (§4.7). `source_channel`
    /// resolves (or creates) the [`crate::domain::WatchedChannel`] this trade
    /// was sourced from when the forward came from a chat channel.
    ///
    /// Validation failures return their typed [`DomainError`] without
    /// touching the store; anything the store itself rejects propagates as
    /// an opaque [`crate::Error`] rather than panicking the caller's task.
    pub async fn create_user_trade(
        &self,
        mut new: NewUserTrade,
        source_channel: Option<SourceChannel>,
        now: DateTime<Utc>,
    ) -> Result<UserTrade> {
        new.validate()?;
        if new.order_type == OrderType::Market {
            new.entry_price = self.price_lookup.latest_price(&new.symbol).await?;
            new.validate()?;
        }

        if let Some(channel) = source_channel {
            let watched = self
                .store
                .find_or_create_watched_channel(new.user_id, &channel.telegram_channel_id, channel.channel_title.as_deref())
                .await?;
            new.watched_channel_id = Some(watched.id);
        }

        let activated_at = (new.initial_status == UserTradeStatus::Activated).then_some(now);
        let created_event = if new.initial_status == UserTradeStatus::Activated {
            EventKind::CreatedActive
        } else {
            EventKind::CreatedPending
        };

        let trade = self.store.create_user_trade(new, activated_at, created_event, now).await?;
        self.index.reindex_user_trade(&trade);
        Ok(trade)
    }

    /// UserTrade creation by adopting a live Recommendation instead of
    /// forwarding raw text (§4.7, §10.5). Rejects a `CLOSED` source and
    /// rejects a user adopting the same Recommendation twice.
    pub async fn adopt_recommendation(&self, user_id: UserId, rec_id: RecommendationId, now: DateTime<Utc>) -> Result<UserTrade> {
        if self.store.find_user_trade_tracking(user_id, rec_id).await?.is_some() {
            return Err(DomainError::AlreadyTracking.into());
        }
        let source = self.store.get_recommendation(rec_id).await?;
        let (new, activated_at) = NewUserTrade::from_recommendation(user_id, &source, now)?;
        let created_event = if new.initial_status == UserTradeStatus::Activated {
            EventKind::CreatedActive
        } else {
            EventKind::CreatedPending
        };

        let trade = self.store.create_user_trade(new, activated_at, created_event, now).await?;
        self.index.reindex_user_trade(&trade);
        Ok(trade)
    }
}

/// Notify `channels` in parallel, persist a `PublishedMessage` per channel
/// that accepted the post, index the entity's triggers regardless of
/// broadcast outcome, then clear its shadow flag (§4.7 step 3).
async fn publish_recommendation(
    store: Arc<dyn Store>,
    index: Arc<TriggerIndex>,
    notifier: Arc<dyn Notifier>,
    rec_id: RecommendationId,
    channels: Vec<ChannelId>,
) {
    let rec = match store.get_recommendation(rec_id).await {
        Ok(rec) => rec,
        Err(err) => {
            warn!(recommendation_id = rec_id.value(), error = %err, "failed to reload recommendation for publish");
            return;
        }
    };

    let card = RecommendationCard::from(&rec);
    let keyboard = Keyboard::default();
    let dispatches = channels.into_iter().map(|channel_id| {
        let notifier = notifier.clone();
        let card = card.clone();
        let keyboard = keyboard.clone();
        async move {
            let result = notifier.post_to_channel(&channel_id.to_string(), &card, &keyboard).await;
            (channel_id, result)
        }
    });

    for (channel_id, result) in futures_util::future::join_all(dispatches).await {
        match result {
            Ok(message_id) => {
                let message = PublishedMessage { recommendation_id: rec_id, channel_id, message_id, published_at: Utc::now() };
                if let Err(err) = store.insert_published_message(message).await {
                    warn!(recommendation_id = rec_id.value(), channel_id = channel_id.value(), error = %err, "failed to persist published message");
                }
            }
            Err(err) => {
                warn!(recommendation_id = rec_id.value(), channel_id = channel_id.value(), error = %err, "failed to publish recommendation card");
            }
        }
    }

    index.reindex_recommendation(&rec);
    if let Err(err) = store.clear_shadow(rec_id).await {
        warn!(recommendation_id = rec_id.value(), error = %err, "failed to clear shadow flag");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::notifier::NullNotifier;
    use crate::adapter::store::pool::{create_pool, run_migrations};
    use crate::adapter::store::sqlite::SqliteStore;
    use crate::domain::{ExitStrategy, ProfitStop, Side, Target};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct FixedPrice(Decimal);

    #[async_trait]
    impl PriceLookup for FixedPrice {
        fn source(&self) -> crate::port::exchange::Source {
            crate::port::exchange::Source::Binance
        }

        async fn latest_price(&self, _symbol: &str) -> Result<Decimal> {
            Ok(self.0)
        }
    }

    fn service(store: Arc<dyn Store>, index: Arc<TriggerIndex>, price: Decimal, channels: Vec<i64>) -> CreationService {
        CreationService::new(store, index, Arc::new(NullNotifier), Arc::new(FixedPrice(price)), channels)
    }

    fn new_rec(order_type: OrderType) -> NewRecommendation {
        NewRecommendation {
            analyst_id: "analyst-1".to_string(),
            channel_id: Some(ChannelId::new(100)),
            symbol: "BTCUSDT".to_string(),
            side: Side::Long,
            entry_price: dec!(60000),
            stop_loss: dec!(59000),
            targets: vec![Target { price: dec!(61000), close_percent: dec!(100) }],
            order_type,
            exit_strategy: ExitStrategy::CloseAtFinalTp,
            profit_stop: ProfitStop::disabled(),
        }
    }

    async fn test_store() -> Arc<dyn Store> {
        let pool = create_pool(":memory:", 1).expect("pool");
        run_migrations(&pool).expect("migrations");
        Arc::new(SqliteStore::new(pool))
    }

    #[tokio::test]
    async fn limit_order_creates_pending_shadow_recommendation() {
        let store = test_store().await;
        let index = Arc::new(TriggerIndex::new(store.clone(), true));
        let svc = service(store.clone(), index, dec!(60000), vec![]);

        let rec = svc.create_recommendation(new_rec(OrderType::Limit), Utc::now()).await.unwrap();
        assert_eq!(rec.status, RecommendationStatus::Pending);
        assert!(rec.is_shadow);

        let reloaded = store.get_recommendation(rec.id).await.unwrap();
        assert!(reloaded.is_shadow, "background task should not have run yet");
    }

    #[tokio::test]
    async fn market_order_fetches_live_price_and_activates() {
        let store = test_store().await;
        let index = Arc::new(TriggerIndex::new(store.clone(), true));
        let svc = service(store.clone(), index, dec!(62000), vec![]);

        let rec = svc.create_recommendation(new_rec(OrderType::Market), Utc::now()).await.unwrap();
        assert_eq!(rec.status, RecommendationStatus::Active);
        assert_eq!(rec.entry_price, dec!(62000));
        assert!(rec.activated_at.is_some());
    }

    #[tokio::test]
    async fn background_publish_clears_shadow_and_indexes() {
        let store = test_store().await;
        let index = Arc::new(TriggerIndex::new(store.clone(), true));
        let svc = service(store.clone(), index.clone(), dec!(60000), vec![]);

        let rec = svc.create_recommendation(new_rec(OrderType::Limit), Utc::now()).await.unwrap();

        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if !store.get_recommendation(rec.id).await.unwrap().is_shadow {
                break;
            }
        }

        let reloaded = store.get_recommendation(rec.id).await.unwrap();
        assert!(!reloaded.is_shadow);
        assert_eq!(index.symbol_count(), 1);
    }

    #[tokio::test]
    async fn adopting_closed_recommendation_is_rejected() {
        let store = test_store().await;
        let index = Arc::new(TriggerIndex::new(store.clone(), true));
        let svc = service(store.clone(), index, dec!(60000), vec![]);

        let rec = store
            .create_recommendation(new_rec(OrderType::Market), RecommendationStatus::Active, Some(Utc::now()), EventKind::CreatedActive, Utc::now())
            .await
            .unwrap();
        store.save_recommendation(&{
            let mut r = rec.clone();
            r.status = RecommendationStatus::Closed;
            r.closed_at = Some(Utc::now());
            r
        }, EventKind::FinalClose { reason: crate::domain::CloseReason::ManualClose, exit_price: dec!(60000) }, Utc::now()).await.unwrap();

        let err = svc.adopt_recommendation(UserId::new(1), rec.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, crate::Error::Domain(DomainError::SourceAlreadyClosed)));
    }

    #[tokio::test]
    async fn adopting_twice_is_rejected() {
        let store = test_store().await;
        let index = Arc::new(TriggerIndex::new(store.clone(), true));
        let svc = service(store.clone(), index, dec!(60000), vec![]);

        let rec = svc.create_recommendation(new_rec(OrderType::Limit), Utc::now()).await.unwrap();
        svc.adopt_recommendation(UserId::new(1), rec.id, Utc::now()).await.unwrap();
        let err = svc.adopt_recommendation(UserId::new(1), rec.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, crate::Error::Domain(DomainError::AlreadyTracking)));
    }

    #[tokio::test]
    async fn user_trade_creation_from_forward_links_watched_channel() {
        let store = test_store().await;
        let index = Arc::new(TriggerIndex::new(store.clone(), true));
        let svc = service(store.clone(), index, dec!(60000), vec![]);

        let new = NewUserTrade {
            user_id: UserId::new(1),
            symbol: "ETHUSDT".to_string(),
            side: Side::Long,
            entry_price: dec!(3000),
            stop_loss: dec!(2900),
            targets: vec![Target { price: dec!(3100), close_percent: dec!(100) }],
            order_type: OrderType::Limit,
            exit_strategy: ExitStrategy::CloseAtFinalTp,
            profit_stop: ProfitStop::disabled(),
            source_recommendation_id: None,
            source_forwarded_text: Some("forwarded text".to_string()),
            watched_channel_id: None,
            initial_status: UserTradeStatus::PendingActivation,
        };
        let source_channel = SourceChannel { telegram_channel_id: "-100123".to_string(), channel_title: Some("Signals".to_string()) };

        let trade = svc.create_user_trade(new, Some(source_channel), Utc::now()).await.unwrap();
        assert!(trade.watched_channel_id.is_some());
        assert_eq!(trade.status, UserTradeStatus::PendingActivation);
    }
}
