//! SQLite store implementation using Diesel (§6 Authoritative Store).

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::model::{
    NewRecommendationEventRow, NewRecommendationRow, NewUserTradeEventRow, NewUserTradeRow,
    NewWatchedChannelRow, PublishedMessageRow, RecommendationEventRow, RecommendationRow,
    UserTradeEventRow, UserTradeRow, WatchedChannelRow,
};
use super::pool::DbPool;
use super::schema::{
    published_messages, recommendation_events, recommendations, user_trade_events, user_trades,
    watched_channels,
};
use crate::domain::{
    EntityKind, EventKind, NewRecommendation, NewUserTrade, OrderType, ProfitStop,
    PublishedMessage, Recommendation, RecommendationEvent, RecommendationId,
    RecommendationStatus, Side, Target, UserId, UserTrade, UserTradeEvent, UserTradeId,
    UserTradeStatus, WatchedChannel, WatchedChannelId,
};
use crate::error::{Error, Result};
use crate::port::store::{Store, TriggerPhase, TriggerSource};

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Long => "LONG",
        Side::Short => "SHORT",
    }
}

fn side_from_str(s: &str) -> Result<Side> {
    match s {
        "LONG" => Ok(Side::Long),
        "SHORT" => Ok(Side::Short),
        other => Err(Error::Adapter(format!("unknown side {other}"))),
    }
}

fn order_type_str(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "MARKET",
        OrderType::Limit => "LIMIT",
        OrderType::StopMarket => "STOP_MARKET",
    }
}

fn order_type_from_str(s: &str) -> Result<OrderType> {
    match s {
        "MARKET" => Ok(OrderType::Market),
        "LIMIT" => Ok(OrderType::Limit),
        "STOP_MARKET" => Ok(OrderType::StopMarket),
        other => Err(Error::Adapter(format!("unknown order type {other}"))),
    }
}

fn exit_strategy_str(strategy: crate::domain::ExitStrategy) -> &'static str {
    use crate::domain::ExitStrategy;
    match strategy {
        ExitStrategy::CloseAtFinalTp => "CLOSE_AT_FINAL_TP",
        ExitStrategy::ManualCloseOnly => "MANUAL_CLOSE_ONLY",
    }
}

fn exit_strategy_from_str(s: &str) -> Result<crate::domain::ExitStrategy> {
    use crate::domain::ExitStrategy;
    match s {
        "CLOSE_AT_FINAL_TP" => Ok(ExitStrategy::CloseAtFinalTp),
        "MANUAL_CLOSE_ONLY" => Ok(ExitStrategy::ManualCloseOnly),
        other => Err(Error::Adapter(format!("unknown exit strategy {other}"))),
    }
}

fn rec_status_str(status: RecommendationStatus) -> &'static str {
    match status {
        RecommendationStatus::Pending => "PENDING",
        RecommendationStatus::Active => "ACTIVE",
        RecommendationStatus::Closed => "CLOSED",
    }
}

fn rec_status_from_str(s: &str) -> Result<RecommendationStatus> {
    match s {
        "PENDING" => Ok(RecommendationStatus::Pending),
        "ACTIVE" => Ok(RecommendationStatus::Active),
        "CLOSED" => Ok(RecommendationStatus::Closed),
        other => Err(Error::Adapter(format!("unknown recommendation status {other}"))),
    }
}

fn trade_status_str(status: UserTradeStatus) -> &'static str {
    match status {
        UserTradeStatus::Watchlist => "WATCHLIST",
        UserTradeStatus::PendingActivation => "PENDING_ACTIVATION",
        UserTradeStatus::Activated => "ACTIVATED",
        UserTradeStatus::Closed => "CLOSED",
    }
}

fn trade_status_from_str(s: &str) -> Result<UserTradeStatus> {
    match s {
        "WATCHLIST" => Ok(UserTradeStatus::Watchlist),
        "PENDING_ACTIVATION" => Ok(UserTradeStatus::PendingActivation),
        "ACTIVATED" => Ok(UserTradeStatus::Activated),
        "CLOSED" => Ok(UserTradeStatus::Closed),
        other => Err(Error::Adapter(format!("unknown user trade status {other}"))),
    }
}

fn decimal_str(d: Decimal) -> String {
    d.to_string()
}

fn decimal_from_str(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| Error::Adapter(format!("invalid decimal {s}: {e}")))
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn from_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Adapter(format!("invalid timestamp {s}: {e}")))
}

fn targets_to_json(targets: &[Target]) -> Result<String> {
    serde_json::to_string(targets).map_err(Error::Json)
}

fn targets_from_json(s: &str) -> Result<Vec<Target>> {
    serde_json::from_str(s).map_err(Error::Json)
}

fn profit_stop_to_json(profit_stop: &ProfitStop) -> Result<String> {
    serde_json::to_string(profit_stop).map_err(Error::Json)
}

fn profit_stop_from_json(s: &str) -> Result<ProfitStop> {
    serde_json::from_str(s).map_err(Error::Json)
}

fn recommendation_from_row(row: RecommendationRow) -> Result<Recommendation> {
    Ok(Recommendation {
        id: RecommendationId::new(row.id),
        analyst_id: row.analyst_id,
        channel_id: row.channel_id.map(Into::into),
        symbol: row.symbol,
        side: side_from_str(&row.side)?,
        entry_price: decimal_from_str(&row.entry_price)?,
        stop_loss: decimal_from_str(&row.stop_loss)?,
        targets: targets_from_json(&row.targets)?,
        order_type: order_type_from_str(&row.order_type)?,
        status: rec_status_from_str(&row.status)?,
        open_size_percent: decimal_from_str(&row.open_size_percent)?,
        exit_strategy: exit_strategy_from_str(&row.exit_strategy)?,
        profit_stop: profit_stop_from_json(&row.profit_stop)?,
        exit_price: row.exit_price.as_deref().map(decimal_from_str).transpose()?,
        created_at: from_rfc3339(&row.created_at)?,
        activated_at: row.activated_at.as_deref().map(from_rfc3339).transpose()?,
        closed_at: row.closed_at.as_deref().map(from_rfc3339).transpose()?,
        updated_at: from_rfc3339(&row.updated_at)?,
        is_shadow: row.is_shadow,
    })
}

fn user_trade_from_row(row: UserTradeRow) -> Result<UserTrade> {
    Ok(UserTrade {
        id: UserTradeId::new(row.id),
        user_id: UserId::new(row.user_id),
        symbol: row.symbol,
        side: side_from_str(&row.side)?,
        entry_price: decimal_from_str(&row.entry_price)?,
        stop_loss: decimal_from_str(&row.stop_loss)?,
        targets: targets_from_json(&row.targets)?,
        order_type: order_type_from_str(&row.order_type)?,
        status: trade_status_from_str(&row.status)?,
        open_size_percent: decimal_from_str(&row.open_size_percent)?,
        exit_strategy: exit_strategy_from_str(&row.exit_strategy)?,
        profit_stop: profit_stop_from_json(&row.profit_stop)?,
        exit_price: row.exit_price.as_deref().map(decimal_from_str).transpose()?,
        source_recommendation_id: row.source_recommendation_id.map(RecommendationId::new),
        source_forwarded_text: row.source_forwarded_text,
        watched_channel_id: row.watched_channel_id.map(WatchedChannelId::new),
        created_at: from_rfc3339(&row.created_at)?,
        activated_at: row.activated_at.as_deref().map(from_rfc3339).transpose()?,
        closed_at: row.closed_at.as_deref().map(from_rfc3339).transpose()?,
        updated_at: from_rfc3339(&row.updated_at)?,
    })
}

/// SQLite-backed authoritative store (§6).
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>> {
        self.pool.get().map_err(Error::Pool)
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn trigger_sources(&self) -> Result<Vec<TriggerSource>> {
        let mut conn = self.conn()?;

        let mut sources = Vec::new();

        let rec_rows: Vec<RecommendationRow> = recommendations::table
            .filter(recommendations::status.ne("CLOSED"))
            .filter(recommendations::is_shadow.eq(false))
            .load(&mut conn)
            .map_err(Error::Store)?;
        for row in rec_rows {
            let rec = recommendation_from_row(row)?;
            let phase = match rec.status {
                RecommendationStatus::Pending => TriggerPhase::AwaitingEntry,
                RecommendationStatus::Active => TriggerPhase::Open,
                RecommendationStatus::Closed => continue,
            };
            sources.push(TriggerSource {
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
            });
        }

        let trade_rows: Vec<UserTradeRow> = user_trades::table
            .filter(user_trades::status.ne("CLOSED"))
            .filter(user_trades::status.ne("WATCHLIST"))
            .load(&mut conn)
            .map_err(Error::Store)?;
        for row in trade_rows {
            let trade = user_trade_from_row(row)?;
            let phase = match trade.status {
                UserTradeStatus::PendingActivation => TriggerPhase::AwaitingEntry,
                UserTradeStatus::Activated => TriggerPhase::Open,
                UserTradeStatus::Watchlist | UserTradeStatus::Closed => continue,
            };
            sources.push(TriggerSource {
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
            });
        }

        Ok(sources)
    }

    async fn create_recommendation(
        &self,
        new: NewRecommendation,
        status: RecommendationStatus,
        activated_at: Option<DateTime<Utc>>,
        created_event: EventKind,
        now: DateTime<Utc>,
    ) -> Result<Recommendation> {
        let mut conn = self.conn()?;
        let now_str = rfc3339(now);
        let activated_at_str = activated_at.map(rfc3339);
        let targets_json = targets_to_json(&new.targets)?;
        let profit_stop_json = profit_stop_to_json(&new.profit_stop)?;

        conn.transaction(|conn| {
            let new_row = NewRecommendationRow {
                analyst_id: &new.analyst_id,
                channel_id: new.channel_id.map(|c| c.value()),
                symbol: &new.symbol,
                side: side_str(new.side),
                entry_price: &decimal_str(new.entry_price),
                stop_loss: &decimal_str(new.stop_loss),
                targets: &targets_json,
                order_type: order_type_str(new.order_type),
                status: rec_status_str(status),
                open_size_percent: &decimal_str(Decimal::ONE_HUNDRED),
                exit_strategy: exit_strategy_str(new.exit_strategy),
                profit_stop: &profit_stop_json,
                exit_price: None,
                created_at: &now_str,
                activated_at: activated_at_str.as_deref(),
                closed_at: None,
                updated_at: &now_str,
                is_shadow: true,
            };
            diesel::insert_into(recommendations::table).values(&new_row).execute(conn)?;

            let id: i64 = diesel::select(diesel::dsl::sql::<diesel::sql_types::BigInt>("last_insert_rowid()"))
                .get_result(conn)?;

            diesel::insert_into(recommendation_events::table)
                .values(&NewRecommendationEventRow {
                    recommendation_id: id,
                    label: &created_event.label(),
                    data: &serde_json::to_string(&created_event).map_err(|e| diesel::result::Error::SerializationError(Box::new(e)))?,
                    created_at: &now_str,
                })
                .execute(conn)?;

            Ok::<_, diesel::result::Error>(id)
        })
        .map_err(Error::Store)
        .and_then(|id| self_get_recommendation_sync(&mut self.conn()?, id))
    }

    async fn get_recommendation(&self, id: RecommendationId) -> Result<Recommendation> {
        let mut conn = self.conn()?;
        self_get_recommendation_sync(&mut conn, id.value())
    }

    async fn save_recommendation(&self, rec: &Recommendation, event: EventKind, now: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn()?;
        let now_str = rfc3339(now);
        let targets_json = targets_to_json(&rec.targets)?;
        let profit_stop_json = profit_stop_to_json(&rec.profit_stop)?;
        let data_json = serde_json::to_string(&event).map_err(Error::Json)?;
        let label = event.label();
        let id = rec.id.value();

        conn.transaction(|conn| {
            diesel::update(recommendations::table.find(id))
                .set((
                    recommendations::symbol.eq(&rec.symbol),
                    recommendations::side.eq(side_str(rec.side)),
                    recommendations::entry_price.eq(decimal_str(rec.entry_price)),
                    recommendations::stop_loss.eq(decimal_str(rec.stop_loss)),
                    recommendations::targets.eq(&targets_json),
                    recommendations::order_type.eq(order_type_str(rec.order_type)),
                    recommendations::status.eq(rec_status_str(rec.status)),
                    recommendations::open_size_percent.eq(decimal_str(rec.open_size_percent)),
                    recommendations::exit_strategy.eq(exit_strategy_str(rec.exit_strategy)),
                    recommendations::profit_stop.eq(&profit_stop_json),
                    recommendations::exit_price.eq(rec.exit_price.map(decimal_str)),
                    recommendations::activated_at.eq(rec.activated_at.map(rfc3339)),
                    recommendations::closed_at.eq(rec.closed_at.map(rfc3339)),
                    recommendations::updated_at.eq(&now_str),
                ))
                .execute(conn)?;

            diesel::insert_into(recommendation_events::table)
                .values(&NewRecommendationEventRow {
                    recommendation_id: id,
                    label: &label,
                    data: &data_json,
                    created_at: &now_str,
                })
                .execute(conn)?;

            Ok::<_, diesel::result::Error>(())
        })
        .map_err(Error::Store)
    }

    async fn recommendation_events(&self, id: RecommendationId) -> Result<Vec<RecommendationEvent>> {
        let mut conn = self.conn()?;
        let rows: Vec<RecommendationEventRow> = recommendation_events::table
            .filter(recommendation_events::recommendation_id.eq(id.value()))
            .order(recommendation_events::id.asc())
            .load(&mut conn)
            .map_err(Error::Store)?;
        rows.into_iter()
            .map(|row| {
                Ok(RecommendationEvent {
                    id: row.id,
                    recommendation_id: RecommendationId::new(row.recommendation_id),
                    kind: serde_json::from_str(&row.data).map_err(Error::Json)?,
                    created_at: from_rfc3339(&row.created_at)?,
                })
            })
            .collect()
    }

    async fn has_recommendation_event(&self, id: RecommendationId, label: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let count: i64 = recommendation_events::table
            .filter(recommendation_events::recommendation_id.eq(id.value()))
            .filter(recommendation_events::label.eq(label))
            .count()
            .get_result(&mut conn)
            .map_err(Error::Store)?;
        Ok(count > 0)
    }

    async fn create_user_trade(
        &self,
        new: NewUserTrade,
        activated_at: Option<DateTime<Utc>>,
        created_event: EventKind,
        now: DateTime<Utc>,
    ) -> Result<UserTrade> {
        let mut conn = self.conn()?;
        let now_str = rfc3339(now);
        let activated_at_str = activated_at.map(rfc3339);
        let targets_json = targets_to_json(&new.targets)?;
        let profit_stop_json = profit_stop_to_json(&new.profit_stop)?;

        let id = conn
            .transaction(|conn| {
                let new_row = NewUserTradeRow {
                    user_id: new.user_id.value(),
                    symbol: &new.symbol,
                    side: side_str(new.side),
                    entry_price: &decimal_str(new.entry_price),
                    stop_loss: &decimal_str(new.stop_loss),
                    targets: &targets_json,
                    order_type: order_type_str(new.order_type),
                    status: trade_status_str(new.initial_status),
                    open_size_percent: &decimal_str(Decimal::ONE_HUNDRED),
                    exit_strategy: exit_strategy_str(new.exit_strategy),
                    profit_stop: &profit_stop_json,
                    exit_price: None,
                    source_recommendation_id: new.source_recommendation_id.map(|id| id.value()),
                    source_forwarded_text: new.source_forwarded_text.as_deref(),
                    watched_channel_id: new.watched_channel_id.map(|id| id.value()),
                    created_at: &now_str,
                    activated_at: activated_at_str.as_deref(),
                    closed_at: None,
                    updated_at: &now_str,
                };
                diesel::insert_into(user_trades::table).values(&new_row).execute(conn)?;

                let id: i64 =
                    diesel::select(diesel::dsl::sql::<diesel::sql_types::BigInt>("last_insert_rowid()"))
                        .get_result(conn)?;

                diesel::insert_into(user_trade_events::table)
                    .values(&NewUserTradeEventRow {
                        user_trade_id: id,
                        label: &created_event.label(),
                        data: &serde_json::to_string(&created_event)
                            .map_err(|e| diesel::result::Error::SerializationError(Box::new(e)))?,
                        created_at: &now_str,
                    })
                    .execute(conn)?;

                Ok::<_, diesel::result::Error>(id)
            })
            .map_err(Error::Store)?;

        self_get_user_trade_sync(&mut self.conn()?, id)
    }

    async fn get_user_trade(&self, id: UserTradeId) -> Result<UserTrade> {
        let mut conn = self.conn()?;
        self_get_user_trade_sync(&mut conn, id.value())
    }

    async fn save_user_trade(&self, trade: &UserTrade, event: EventKind, now: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn()?;
        let now_str = rfc3339(now);
        let targets_json = targets_to_json(&trade.targets)?;
        let profit_stop_json = profit_stop_to_json(&trade.profit_stop)?;
        let data_json = serde_json::to_string(&event).map_err(Error::Json)?;
        let label = event.label();
        let id = trade.id.value();

        conn.transaction(|conn| {
            diesel::update(user_trades::table.find(id))
                .set((
                    user_trades::symbol.eq(&trade.symbol),
                    user_trades::side.eq(side_str(trade.side)),
                    user_trades::entry_price.eq(decimal_str(trade.entry_price)),
                    user_trades::stop_loss.eq(decimal_str(trade.stop_loss)),
                    user_trades::targets.eq(&targets_json),
                    user_trades::order_type.eq(order_type_str(trade.order_type)),
                    user_trades::status.eq(trade_status_str(trade.status)),
                    user_trades::open_size_percent.eq(decimal_str(trade.open_size_percent)),
                    user_trades::exit_strategy.eq(exit_strategy_str(trade.exit_strategy)),
                    user_trades::profit_stop.eq(&profit_stop_json),
                    user_trades::exit_price.eq(trade.exit_price.map(decimal_str)),
                    user_trades::activated_at.eq(trade.activated_at.map(rfc3339)),
                    user_trades::closed_at.eq(trade.closed_at.map(rfc3339)),
                    user_trades::updated_at.eq(&now_str),
                ))
                .execute(conn)?;

            diesel::insert_into(user_trade_events::table)
                .values(&NewUserTradeEventRow {
                    user_trade_id: id,
                    label: &label,
                    data: &data_json,
                    created_at: &now_str,
                })
                .execute(conn)?;

            Ok::<_, diesel::result::Error>(())
        })
        .map_err(Error::Store)
    }

    async fn user_trade_events(&self, id: UserTradeId) -> Result<Vec<UserTradeEvent>> {
        let mut conn = self.conn()?;
        let rows: Vec<UserTradeEventRow> = user_trade_events::table
            .filter(user_trade_events::user_trade_id.eq(id.value()))
            .order(user_trade_events::id.asc())
            .load(&mut conn)
            .map_err(Error::Store)?;
        rows.into_iter()
            .map(|row| {
                Ok(UserTradeEvent {
                    id: row.id,
                    user_trade_id: UserTradeId::new(row.user_trade_id),
                    kind: serde_json::from_str(&row.data).map_err(Error::Json)?,
                    created_at: from_rfc3339(&row.created_at)?,
                })
            })
            .collect()
    }

    async fn has_user_trade_event(&self, id: UserTradeId, label: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let count: i64 = user_trade_events::table
            .filter(user_trade_events::user_trade_id.eq(id.value()))
            .filter(user_trade_events::label.eq(label))
            .count()
            .get_result(&mut conn)
            .map_err(Error::Store)?;
        Ok(count > 0)
    }

    async fn find_user_trade_tracking(
        &self,
        user_id: UserId,
        rec_id: RecommendationId,
    ) -> Result<Option<UserTradeId>> {
        let mut conn = self.conn()?;
        let id: Option<i64> = user_trades::table
            .filter(user_trades::user_id.eq(user_id.value()))
            .filter(user_trades::source_recommendation_id.eq(rec_id.value()))
            .filter(user_trades::status.ne("CLOSED"))
            .select(user_trades::id)
            .first(&mut conn)
            .optional()
            .map_err(Error::Store)?;
        Ok(id.map(UserTradeId::new))
    }

    async fn list_published_messages(&self, rec_id: RecommendationId) -> Result<Vec<PublishedMessage>> {
        let mut conn = self.conn()?;
        let rows: Vec<PublishedMessageRow> = published_messages::table
            .filter(published_messages::recommendation_id.eq(rec_id.value()))
            .load(&mut conn)
            .map_err(Error::Store)?;
        rows.into_iter()
            .map(|row| {
                Ok(PublishedMessage {
                    recommendation_id: RecommendationId::new(row.recommendation_id),
                    channel_id: row.channel_id.into(),
                    message_id: row.message_id,
                    published_at: from_rfc3339(&row.published_at)?,
                })
            })
            .collect()
    }

    async fn insert_published_message(&self, message: PublishedMessage) -> Result<()> {
        let mut conn = self.conn()?;
        let row = PublishedMessageRow {
            recommendation_id: message.recommendation_id.value(),
            channel_id: message.channel_id.value(),
            message_id: message.message_id,
            published_at: rfc3339(message.published_at),
        };
        diesel::insert_into(published_messages::table).values(&row).execute(&mut conn).map_err(Error::Store)?;
        Ok(())
    }

    async fn clear_shadow(&self, id: RecommendationId) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::update(recommendations::table.find(id.value()))
            .set(recommendations::is_shadow.eq(false))
            .execute(&mut conn)
            .map_err(Error::Store)?;
        Ok(())
    }

    async fn find_or_create_watched_channel(
        &self,
        user_id: UserId,
        telegram_channel_id: &str,
        channel_title: Option<&str>,
    ) -> Result<WatchedChannel> {
        let mut conn = self.conn()?;

        let existing: Option<WatchedChannelRow> = watched_channels::table
            .filter(watched_channels::user_id.eq(user_id.value()))
            .filter(watched_channels::telegram_channel_id.eq(telegram_channel_id))
            .first(&mut conn)
            .optional()
            .map_err(Error::Store)?;

        let row = if let Some(row) = existing {
            row
        } else {
            diesel::insert_into(watched_channels::table)
                .values(&NewWatchedChannelRow {
                    user_id: user_id.value(),
                    telegram_channel_id,
                    channel_title,
                    is_active: true,
                })
                .execute(&mut conn)
                .map_err(Error::Store)?;

            let id: i64 = diesel::select(diesel::dsl::sql::<diesel::sql_types::BigInt>("last_insert_rowid()"))
                .get_result(&mut conn)
                .map_err(Error::Store)?;

            watched_channels::table.find(id).first(&mut conn).map_err(Error::Store)?
        };

        Ok(WatchedChannel {
            id: WatchedChannelId::new(row.id),
            user_id: UserId::new(row.user_id),
            telegram_channel_id: row.telegram_channel_id,
            channel_title: row.channel_title,
            is_active: row.is_active,
        })
    }
}

fn self_get_recommendation_sync(conn: &mut SqliteConnection, id: i64) -> Result<Recommendation> {
    let row: RecommendationRow = recommendations::table.find(id).first(conn).map_err(Error::Store)?;
    recommendation_from_row(row)
}

fn self_get_user_trade_sync(conn: &mut SqliteConnection, id: i64) -> Result<UserTrade> {
    let row: UserTradeRow = user_trades::table.find(id).first(conn).map_err(Error::Store)?;
    user_trade_from_row(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::store::pool::{create_pool, run_migrations};
    use crate::domain::{ExitStrategy, NewRecommendation};
    use rust_decimal_macros::dec;

    fn setup() -> SqliteStore {
        let pool = create_pool(":memory:", 1).unwrap();
        run_migrations(&pool).unwrap();
        SqliteStore::new(pool)
    }

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

    #[tokio::test]
    async fn create_and_fetch_recommendation_roundtrips() {
        let store = setup();
        let now = Utc::now();
        let rec = store.create_recommendation(new_rec(), RecommendationStatus::Pending, None, EventKind::CreatedPending, now).await.unwrap();
        assert!(rec.is_shadow);
        assert_eq!(rec.status, RecommendationStatus::Pending);

        let fetched = store.get_recommendation(rec.id).await.unwrap();
        assert_eq!(fetched.entry_price, dec!(60000));
        assert_eq!(fetched.targets.len(), 1);
    }

    #[tokio::test]
    async fn save_recommendation_appends_event() {
        let store = setup();
        let now = Utc::now();
        let mut rec = store.create_recommendation(new_rec(), RecommendationStatus::Pending, None, EventKind::CreatedPending, now).await.unwrap();
        let event = rec.activate(now).unwrap();
        store.save_recommendation(&rec, event, now).await.unwrap();

        let events = store.recommendation_events(rec.id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(store.has_recommendation_event(rec.id, "ACTIVATED").await.unwrap());
    }

    #[tokio::test]
    async fn trigger_sources_skips_closed_and_shadow() {
        let store = setup();
        let now = Utc::now();
        let shadow = store.create_recommendation(new_rec(), RecommendationStatus::Pending, None, EventKind::CreatedPending, now).await.unwrap();
        assert!(shadow.is_shadow);

        let sources = store.trigger_sources().await.unwrap();
        assert!(sources.is_empty(), "shadow entities must not contribute triggers");

        store.clear_shadow(shadow.id).await.unwrap();
        let sources = store.trigger_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
    }

    #[tokio::test]
    async fn watched_channel_lookup_or_create_reuses_row() {
        let store = setup();
        let user = UserId::new(7);
        let first = store.find_or_create_watched_channel(user, "chan-1", Some("My Channel")).await.unwrap();
        let second = store.find_or_create_watched_channel(user, "chan-1", None).await.unwrap();
        assert_eq!(first.id, second.id);
    }
}
