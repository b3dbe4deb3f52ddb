//! Published messages and watched channels (§3).

use chrono::{DateTime, Utc};

use super::id::{ChannelId, RecommendationId, UserId, WatchedChannelId};

/// The opaque `(channel, message)` identifier pair for a card rendered on the
/// chat platform, recorded once per channel a Recommendation was published to.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub recommendation_id: RecommendationId,
    pub channel_id: ChannelId,
    pub message_id: String,
    pub published_at: DateTime<Utc>,
}

/// A user-specific subscription object linking a UserTrade to the broadcast
/// channel that sourced it. Looked up by `(user_id, telegram_channel_id)` and
/// created on first sight of that pair (§4.7, §10.5).
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedChannel {
    pub id: WatchedChannelId,
    pub user_id: UserId,
    pub telegram_channel_id: String,
    pub channel_title: Option<String>,
    pub is_active: bool,
}
