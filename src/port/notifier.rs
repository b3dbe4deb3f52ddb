//! The chat-platform notification surface (§4.6, §6).

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{OrderType, ProfitStop, Recommendation, Side, Target};
use crate::Result;

/// Opaque inline-keyboard payload; the notifier adapter knows how to render
/// it, the core only ever passes it through unchanged.
#[derive(Debug, Clone, Default)]
pub struct Keyboard(pub Vec<Vec<(String, String)>>);

/// The read-only view of a Recommendation the notifier renders into a card.
/// Kept separate from the domain entity so card layout never depends on the
/// persistence shape (e.g. `is_shadow` is never shown).
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationCard {
    pub id: i64,
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub targets: Vec<Target>,
    pub order_type: OrderType,
    pub status: String,
    pub open_size_percent: Decimal,
    pub profit_stop: ProfitStop,
}

impl From<&Recommendation> for RecommendationCard {
    fn from(rec: &Recommendation) -> Self {
        Self {
            id: rec.id.value(),
            symbol: rec.symbol.clone(),
            side: rec.side,
            entry_price: rec.entry_price,
            stop_loss: rec.stop_loss,
            targets: rec.targets.clone(),
            order_type: rec.order_type,
            status: format!("{:?}", rec.status).to_uppercase(),
            open_size_percent: rec.open_size_percent,
            profit_stop: rec.profit_stop.clone(),
        }
    }
}

/// Four operations used by Lifecycle and Creation (§4.6). Every call is
/// reported as a per-call failure; callers treat failures as non-fatal and do
/// not retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a fresh card to a broadcast channel, returning its message id.
    async fn post_to_channel(
        &self,
        channel_id: &str,
        card: &RecommendationCard,
        keyboard: &Keyboard,
    ) -> Result<String>;

    /// Idempotent rewrite of a previously posted card.
    async fn edit_card(
        &self,
        channel_id: &str,
        message_id: &str,
        card: &RecommendationCard,
        bot_username: &str,
    ) -> Result<()>;

    /// Threaded reply under an existing card for a lifecycle event.
    async fn post_reply(&self, channel_id: &str, message_id: &str, text: &str) -> Result<()>;

    /// Direct message to a UserTrade owner.
    async fn send_private_text(&self, chat_id: &str, text: &str) -> Result<()>;
}
