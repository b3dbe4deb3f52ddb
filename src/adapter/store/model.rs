//! Database row types for Diesel ORM.
//!
//! Every price and JSON-shaped field is stored as `Text`: decimals round-trip
//! exactly through their string representation, and `targets`/`profit_stop`
//! are small enough that a second table would be pure overhead.

use diesel::prelude::*;

use super::schema::{
    published_messages, recommendation_events, recommendations, user_trade_events, user_trades,
    watched_channels,
};

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = recommendations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecommendationRow {
    pub id: i64,
    pub analyst_id: String,
    pub channel_id: Option<i64>,
    pub symbol: String,
    pub side: String,
    pub entry_price: String,
    pub stop_loss: String,
    pub targets: String,
    pub order_type: String,
    pub status: String,
    pub open_size_percent: String,
    pub exit_strategy: String,
    pub profit_stop: String,
    pub exit_price: Option<String>,
    pub created_at: String,
    pub activated_at: Option<String>,
    pub closed_at: Option<String>,
    pub updated_at: String,
    pub is_shadow: bool,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = recommendations)]
pub struct NewRecommendationRow<'a> {
    pub analyst_id: &'a str,
    pub channel_id: Option<i64>,
    pub symbol: &'a str,
    pub side: &'a str,
    pub entry_price: &'a str,
    pub stop_loss: &'a str,
    pub targets: &'a str,
    pub order_type: &'a str,
    pub status: &'a str,
    pub open_size_percent: &'a str,
    pub exit_strategy: &'a str,
    pub profit_stop: &'a str,
    pub exit_price: Option<&'a str>,
    pub created_at: &'a str,
    pub activated_at: Option<&'a str>,
    pub closed_at: Option<&'a str>,
    pub updated_at: &'a str,
    pub is_shadow: bool,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = recommendation_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecommendationEventRow {
    pub id: i64,
    pub recommendation_id: i64,
    pub label: String,
    pub data: String,
    pub created_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = recommendation_events)]
pub struct NewRecommendationEventRow<'a> {
    pub recommendation_id: i64,
    pub label: &'a str,
    pub data: &'a str,
    pub created_at: &'a str,
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = user_trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserTradeRow {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub side: String,
    pub entry_price: String,
    pub stop_loss: String,
    pub targets: String,
    pub order_type: String,
    pub status: String,
    pub open_size_percent: String,
    pub exit_strategy: String,
    pub profit_stop: String,
    pub exit_price: Option<String>,
    pub source_recommendation_id: Option<i64>,
    pub source_forwarded_text: Option<String>,
    pub watched_channel_id: Option<i64>,
    pub created_at: String,
    pub activated_at: Option<String>,
    pub closed_at: Option<String>,
    pub updated_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = user_trades)]
pub struct NewUserTradeRow<'a> {
    pub user_id: i64,
    pub symbol: &'a str,
    pub side: &'a str,
    pub entry_price: &'a str,
    pub stop_loss: &'a str,
    pub targets: &'a str,
    pub order_type: &'a str,
    pub status: &'a str,
    pub open_size_percent: &'a str,
    pub exit_strategy: &'a str,
    pub profit_stop: &'a str,
    pub exit_price: Option<&'a str>,
    pub source_recommendation_id: Option<i64>,
    pub source_forwarded_text: Option<&'a str>,
    pub watched_channel_id: Option<i64>,
    pub created_at: &'a str,
    pub activated_at: Option<&'a str>,
    pub closed_at: Option<&'a str>,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = user_trade_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserTradeEventRow {
    pub id: i64,
    pub user_trade_id: i64,
    pub label: String,
    pub data: String,
    pub created_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = user_trade_events)]
pub struct NewUserTradeEventRow<'a> {
    pub user_trade_id: i64,
    pub label: &'a str,
    pub data: &'a str,
    pub created_at: &'a str,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = published_messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PublishedMessageRow {
    pub recommendation_id: i64,
    pub channel_id: i64,
    pub message_id: String,
    pub published_at: String,
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = watched_channels)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WatchedChannelRow {
    pub id: i64,
    pub user_id: i64,
    pub telegram_channel_id: String,
    pub channel_title: Option<String>,
    pub is_active: bool,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = watched_channels)]
pub struct NewWatchedChannelRow<'a> {
    pub user_id: i64,
    pub telegram_channel_id: &'a str,
    pub channel_title: Option<&'a str>,
    pub is_active: bool,
}
