//! Domain types for the trade-signal lifecycle engine.
//!
//! - [`id`]: newtype identifiers for entities
//! - [`error`]: semantic validation errors
//! - [`types`]: shared enums and value objects (side, status, targets, ...)
//! - [`recommendation`]: the analyst-authored [`Recommendation`](recommendation::Recommendation)
//! - [`user_trade`]: the subscriber-owned [`UserTrade`](user_trade::UserTrade)
//! - [`event`]: the append-only lifecycle event log
//! - [`trigger`]: in-memory price triggers derived from entity state
//! - [`channel`]: published messages and watched channels

pub mod channel;
pub mod error;
pub mod event;
pub mod id;
pub mod recommendation;
pub mod trigger;
pub mod types;
pub mod user_trade;

pub use channel::{PublishedMessage, WatchedChannel};
pub use error::DomainError;
pub use event::{EventKind, RecommendationEvent, UserTradeEvent};
pub use id::{ChannelId, EntityKind, RecommendationId, UserId, UserTradeId, WatchedChannelId};
pub use recommendation::{NewRecommendation, Recommendation};
pub use trigger::{Trigger, TriggerType};
pub use types::{
    CloseReason, ExitStrategy, OrderType, ProfitStop, ProfitStopMode, RecommendationStatus, Side,
    Target, TrailingUnit, UserTradeStatus,
};
pub use user_trade::{NewUserTrade, UserTrade};
