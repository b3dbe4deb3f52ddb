//! The authoritative persistence layer (§6).
//!
//! Kept object-safe (`Arc<dyn Store>`) so [`crate::service`] never depends on
//! `diesel` directly. Each mutating method is responsible for its own
//! read-validate-write-event sequencing; [`crate::service::lifecycle::LifecycleService`]
//! supplies the row-scoped locking around calls into this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    EntityKind, EventKind, NewRecommendation, NewUserTrade, OrderType, PublishedMessage,
    Recommendation, RecommendationEvent, RecommendationId, RecommendationStatus, Side, UserId,
    UserTrade, UserTradeEvent, UserTradeId, WatchedChannel,
};
use crate::Result;

/// Which lifecycle phase an entity is in, for the purposes of trigger derivation (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPhase {
    /// `PENDING` or `PENDING_ACTIVATION`: only an `ENTRY` trigger applies.
    AwaitingEntry,
    /// `ACTIVE` or `ACTIVATED`: `SL`, `TP{i}`, and optional `PROFIT_STOP` apply.
    Open,
}

/// One row of the flattened view the Trigger Index rebuilds from — everything
/// needed to derive a symbol's triggers without a second store round-trip per
/// entity (§4.3, §6 `get_active_triggers_snapshot`).
#[derive(Debug, Clone)]
pub struct TriggerSource {
    pub entity_kind: EntityKind,
    pub entity_id: i64,
    pub owner_id: String,
    pub symbol: String,
    pub side: Side,
    pub phase: TriggerPhase,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub targets: Vec<(u32, Decimal)>,
    pub order_type: OrderType,
    pub profit_stop_price: Option<Decimal>,
}

/// The store's view of persistence the core subsystems consume.
///
/// Implemented by the `sqlite` adapter; a second implementation (in-memory,
/// for tests) is equally possible since nothing here names `diesel` types.
#[async_trait]
pub trait Store: Send + Sync {
    /// Flattened snapshot of every entity that should contribute triggers,
    /// for a full Trigger Index rebuild (§4.3 `rebuild_from_store`).
    async fn trigger_sources(&self) -> Result<Vec<TriggerSource>>;

    // -- Recommendation --

    /// Persist a brand-new, `is_shadow=true` Recommendation and its `CREATED_*`
    /// event in one transaction (§4.7 step 2).
    ///
    /// `status`/`activated_at` are supplied rather than hardcoded to `PENDING`
    /// so a `MARKET` order (filled immediately, no waiting entry) can be
    /// persisted as already `ACTIVE` with a single `CREATED_ACTIVE` event,
    /// matching the `created_event` passed alongside.
    async fn create_recommendation(
        &self,
        new: NewRecommendation,
        status: RecommendationStatus,
        activated_at: Option<DateTime<Utc>>,
        created_event: EventKind,
        now: DateTime<Utc>,
    ) -> Result<Recommendation>;

    async fn get_recommendation(&self, id: RecommendationId) -> Result<Recommendation>;

    /// Persist the already-transitioned entity plus its event in one
    /// transaction; the caller (Lifecycle Service) holds the per-entity lock
    /// and has already re-read + validated (§4.5).
    async fn save_recommendation(
        &self,
        rec: &Recommendation,
        event: EventKind,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn recommendation_events(&self, id: RecommendationId) -> Result<Vec<RecommendationEvent>>;

    /// Whether an event of this label already exists for the entity — the
    /// idempotency check backing §4.5/§8's "at most one terminal occurrence" law.
    async fn has_recommendation_event(&self, id: RecommendationId, label: &str) -> Result<bool>;

    // -- UserTrade --

    /// `activated_at` lets a `MARKET`-order UserTrade or one adopted from an
    /// already-`ACTIVE` Recommendation (§10.5) be persisted pre-activated
    /// rather than always starting the clock at `None`.
    async fn create_user_trade(
        &self,
        new: NewUserTrade,
        activated_at: Option<DateTime<Utc>>,
        created_event: EventKind,
        now: DateTime<Utc>,
    ) -> Result<UserTrade>;

    async fn get_user_trade(&self, id: UserTradeId) -> Result<UserTrade>;

    async fn save_user_trade(&self, trade: &UserTrade, event: EventKind, now: DateTime<Utc>) -> Result<()>;

    async fn user_trade_events(&self, id: UserTradeId) -> Result<Vec<UserTradeEvent>>;

    async fn has_user_trade_event(&self, id: UserTradeId, label: &str) -> Result<bool>;

    /// Whether `user_id` already has a (non-closed) UserTrade sourced from
    /// `rec_id` — backs the "may not adopt twice" rule (§4.7).
    async fn find_user_trade_tracking(
        &self,
        user_id: UserId,
        rec_id: RecommendationId,
    ) -> Result<Option<UserTradeId>>;

    // -- Published messages & channels --

    async fn list_published_messages(&self, rec_id: RecommendationId) -> Result<Vec<PublishedMessage>>;

    async fn insert_published_message(&self, message: PublishedMessage) -> Result<()>;

    /// Clear the `is_shadow` flag once the background publish task has
    /// finished indexing (§4.7 step 3d).
    async fn clear_shadow(&self, id: RecommendationId) -> Result<()>;

    async fn find_or_create_watched_channel(
        &self,
        user_id: UserId,
        telegram_channel_id: &str,
        channel_title: Option<&str>,
    ) -> Result<WatchedChannel>;
}
