//! A subscriber's personal tracked copy of a trade signal (§3).
//!
//! Shares the Recommendation's shape and transition arithmetic, minus
//! publishing: its status taxonomy has an extra pre-activation step
//! (`WATCHLIST`) and it may be linked back to the Recommendation or forwarded
//! text that seeded it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::event::EventKind;
use super::id::{RecommendationId, UserId, UserTradeId, WatchedChannelId};
use super::recommendation::Recommendation;
use super::types::{CloseReason, ExitStrategy, OrderType, ProfitStop, Side, Target, UserTradeStatus};

/// Fields required to construct a brand-new UserTrade from forwarded content.
#[derive(Debug, Clone)]
pub struct NewUserTrade {
    pub user_id: UserId,
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub targets: Vec<Target>,
    pub order_type: OrderType,
    pub exit_strategy: ExitStrategy,
    pub profit_stop: ProfitStop,
    pub source_recommendation_id: Option<RecommendationId>,
    pub source_forwarded_text: Option<String>,
    pub watched_channel_id: Option<WatchedChannelId>,
    /// Initial status requested by the caller's policy (§4.7): `WATCHLIST` or
    /// `PENDING_ACTIVATION`.
    pub initial_status: UserTradeStatus,
}

/// A subscriber's tracked copy, `WATCHLIST`/`PENDING_ACTIVATION` → `ACTIVATED` → `CLOSED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTrade {
    pub id: UserTradeId,
    pub user_id: UserId,
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub targets: Vec<Target>,
    pub order_type: OrderType,
    pub status: UserTradeStatus,
    pub open_size_percent: Decimal,
    pub exit_strategy: ExitStrategy,
    pub profit_stop: ProfitStop,
    pub exit_price: Option<Decimal>,
    pub source_recommendation_id: Option<RecommendationId>,
    pub source_forwarded_text: Option<String>,
    pub watched_channel_id: Option<WatchedChannelId>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

fn validate_price(price: Decimal) -> Result<(), DomainError> {
    if price.is_sign_positive() && !price.is_zero() {
        Ok(())
    } else {
        Err(DomainError::InvalidPrice(price))
    }
}

fn validate_targets(side: Side, entry: Decimal, targets: &[Target]) -> Result<(), DomainError> {
    if targets.is_empty() {
        return Err(DomainError::EmptyTargets);
    }
    let mut sum = Decimal::ZERO;
    for target in targets {
        validate_price(target.price)?;
        sum += target.close_percent;
        match side {
            Side::Long if target.price <= entry => {
                return Err(DomainError::LongTargetBelowEntry { entry, price: target.price })
            }
            Side::Short if target.price >= entry => {
                return Err(DomainError::ShortTargetAboveEntry { entry, price: target.price })
            }
            _ => {}
        }
    }
    if sum > Decimal::ONE_HUNDRED {
        return Err(DomainError::TargetsExceed100 { sum });
    }
    Ok(())
}

impl NewUserTrade {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.symbol.trim().is_empty() {
            return Err(DomainError::EmptyAsset);
        }
        validate_price(self.entry_price)?;
        validate_price(self.stop_loss)?;
        match self.side {
            Side::Long if self.stop_loss >= self.entry_price => {
                return Err(DomainError::LongStopAboveEntry { entry: self.entry_price, stop_loss: self.stop_loss })
            }
            Side::Short if self.stop_loss <= self.entry_price => {
                return Err(DomainError::ShortStopBelowEntry { entry: self.entry_price, stop_loss: self.stop_loss })
            }
            _ => {}
        }
        validate_targets(self.side, self.entry_price, &self.targets)
    }

    /// Build adoption fields from a live Recommendation (§4.7, §10.5): copies
    /// price/targets/order fields and mirrors the source's status into the
    /// UserTrade taxonomy. Rejects adopting an already-`CLOSED` source; the
    /// "may not adopt twice" check is the caller's responsibility since it
    /// requires a store lookup this constructor has no access to.
    pub fn from_recommendation(
        user_id: UserId,
        source: &Recommendation,
        now: DateTime<Utc>,
    ) -> Result<(Self, Option<DateTime<Utc>>), DomainError> {
        use super::types::RecommendationStatus;
        let (initial_status, activated_at) = match source.status {
            RecommendationStatus::Pending => (UserTradeStatus::PendingActivation, None),
            RecommendationStatus::Active => (UserTradeStatus::Activated, Some(source.activated_at.unwrap_or(now))),
            RecommendationStatus::Closed => return Err(DomainError::SourceAlreadyClosed),
        };
        Ok((
            Self {
                user_id,
                symbol: source.symbol.clone(),
                side: source.side,
                entry_price: source.entry_price,
                stop_loss: source.stop_loss,
                targets: source.targets.clone(),
                order_type: source.order_type,
                exit_strategy: source.exit_strategy,
                profit_stop: source.profit_stop.clone(),
                source_recommendation_id: Some(source.id),
                source_forwarded_text: None,
                watched_channel_id: None,
                initial_status,
            },
            activated_at,
        ))
    }
}

impl UserTrade {
    /// Construct from forwarded content (§4.7 "UserTrade creation from forwarded content").
    ///
    /// `activated_at` is stamped `now` when `initial_status` is already
    /// `ACTIVATED` (a `MARKET` order fills immediately); otherwise `None`.
    pub fn create(id: UserTradeId, new: NewUserTrade, now: DateTime<Utc>) -> Result<Self, DomainError> {
        new.validate()?;
        let activated_at = (new.initial_status == UserTradeStatus::Activated).then_some(now);
        Ok(Self {
            id,
            user_id: new.user_id,
            symbol: new.symbol,
            side: new.side,
            entry_price: new.entry_price,
            stop_loss: new.stop_loss,
            targets: new.targets,
            order_type: new.order_type,
            status: new.initial_status,
            open_size_percent: Decimal::ONE_HUNDRED,
            exit_strategy: new.exit_strategy,
            profit_stop: new.profit_stop,
            exit_price: None,
            source_recommendation_id: new.source_recommendation_id,
            source_forwarded_text: new.source_forwarded_text,
            watched_channel_id: new.watched_channel_id,
            created_at: now,
            activated_at,
            closed_at: None,
            updated_at: now,
        })
    }

    /// Adopt a live Recommendation as a personal UserTrade (§4.7, §10.5).
    /// Rejects an already-`CLOSED` source; double-adoption is the caller's
    /// responsibility to reject via a prior store lookup (`AlreadyTracking`).
    pub fn from_recommendation(
        id: UserTradeId,
        user_id: UserId,
        source: &Recommendation,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        use super::types::RecommendationStatus;
        let (status, activated_at) = match source.status {
            RecommendationStatus::Pending => (UserTradeStatus::PendingActivation, None),
            RecommendationStatus::Active => (UserTradeStatus::Activated, Some(source.activated_at.unwrap_or(now))),
            RecommendationStatus::Closed => return Err(DomainError::SourceAlreadyClosed),
        };
        Ok(Self {
            id,
            user_id,
            symbol: source.symbol.clone(),
            side: source.side,
            entry_price: source.entry_price,
            stop_loss: source.stop_loss,
            targets: source.targets.clone(),
            order_type: source.order_type,
            status,
            open_size_percent: source.open_size_percent,
            exit_strategy: source.exit_strategy,
            profit_stop: source.profit_stop.clone(),
            exit_price: None,
            source_recommendation_id: Some(source.id),
            source_forwarded_text: None,
            watched_channel_id: None,
            created_at: now,
            activated_at,
            closed_at: None,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn final_target_index(&self) -> Option<u32> {
        if self.targets.is_empty() {
            None
        } else {
            Some(self.targets.len() as u32)
        }
    }

    /// `WATCHLIST|PENDING_ACTIVATION → ACTIVATED`.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<EventKind, DomainError> {
        if self.status == UserTradeStatus::Closed {
            return Err(DomainError::AlreadyClosed);
        }
        self.status = UserTradeStatus::Activated;
        self.activated_at = Some(now);
        self.updated_at = now;
        Ok(EventKind::Activated)
    }

    /// Invalidation before activation transitions directly to `CLOSED` with no PnL (§3).
    pub fn invalidate(&mut self, sl_price: Decimal, now: DateTime<Utc>) -> Result<EventKind, DomainError> {
        if self.status == UserTradeStatus::Closed {
            return Err(DomainError::AlreadyClosed);
        }
        self.status = UserTradeStatus::Closed;
        self.exit_price = Some(sl_price);
        self.closed_at = Some(now);
        self.open_size_percent = Decimal::ZERO;
        self.updated_at = now;
        Ok(EventKind::Invalidated { exit_price: sl_price })
    }

    pub fn record_tp_hit(&mut self, index: u32, now: DateTime<Utc>) -> EventKind {
        self.updated_at = now;
        EventKind::TpHit { index }
    }

    pub fn partial_close(&mut self, percent: Decimal, exit_price: Decimal, now: DateTime<Utc>) -> Result<EventKind, DomainError> {
        if self.status != UserTradeStatus::Activated {
            return Err(DomainError::NotActive);
        }
        let clamped = percent.clamp(Decimal::ZERO, self.open_size_percent);
        self.open_size_percent -= clamped;
        let pnl_percent = self.side.pnl_percent(self.entry_price, exit_price);
        self.updated_at = now;
        Ok(EventKind::Partial { percent: clamped, exit_price, pnl_percent })
    }

    #[must_use]
    pub fn is_residual_closeable(&self) -> bool {
        self.open_size_percent < Decimal::new(1, 1)
    }

    pub fn close(&mut self, reason: CloseReason, exit_price: Decimal, now: DateTime<Utc>) -> EventKind {
        self.status = UserTradeStatus::Closed;
        self.exit_price = Some(exit_price);
        self.closed_at = Some(now);
        self.open_size_percent = Decimal::ZERO;
        self.profit_stop.active = false;
        self.updated_at = now;
        EventKind::FinalClose { reason, exit_price }
    }

    pub fn update_stop_loss(&mut self, new_sl: Decimal, now: DateTime<Utc>) -> Result<EventKind, DomainError> {
        validate_price(new_sl)?;
        self.stop_loss = new_sl;
        self.updated_at = now;
        Ok(EventKind::SlUpdated { stop_loss: new_sl })
    }

    pub fn update_entry(&mut self, new_entry: Decimal, now: DateTime<Utc>) -> Result<EventKind, DomainError> {
        if self.status != UserTradeStatus::Watchlist && self.status != UserTradeStatus::PendingActivation {
            return Err(DomainError::EntryEditNotAllowed);
        }
        validate_price(new_entry)?;
        self.entry_price = new_entry;
        self.updated_at = now;
        Ok(EventKind::EntryUpdated { entry: new_entry })
    }

    pub fn update_targets(&mut self, targets: Vec<Target>, now: DateTime<Utc>) -> Result<EventKind, DomainError> {
        validate_targets(self.side, self.entry_price, &targets)?;
        self.targets = targets;
        self.updated_at = now;
        Ok(EventKind::TpUpdated)
    }

    pub fn set_exit_strategy(&mut self, strategy: ExitStrategy, now: DateTime<Utc>) -> EventKind {
        self.exit_strategy = strategy;
        self.updated_at = now;
        EventKind::ExitStrategyUpdated
    }

    pub fn move_sl_to_breakeven(&mut self, buffer_bps: Decimal, now: DateTime<Utc>) -> Result<EventKind, DomainError> {
        if self.status != UserTradeStatus::Activated {
            return Err(DomainError::NotActive);
        }
        let buffer = self.entry_price * buffer_bps / Decimal::new(10_000, 0);
        let new_sl = match self.side {
            Side::Long => self.entry_price + buffer,
            Side::Short => self.entry_price - buffer,
        };
        self.stop_loss = new_sl;
        self.updated_at = now;
        Ok(EventKind::SlUpdated { stop_loss: new_sl })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::RecommendationStatus;
    use rust_decimal_macros::dec;

    fn new_trade() -> NewUserTrade {
        NewUserTrade {
            user_id: UserId::new(7),
            symbol: "ETHUSDT".to_string(),
            side: Side::Long,
            entry_price: dec!(3000),
            stop_loss: dec!(2900),
            targets: vec![Target { price: dec!(3200), close_percent: dec!(100) }],
            order_type: OrderType::Limit,
            exit_strategy: ExitStrategy::CloseAtFinalTp,
            profit_stop: ProfitStop::disabled(),
            source_recommendation_id: None,
            source_forwarded_text: Some("buy ETH at 3000 sl 2900 tp 3200".to_string()),
            watched_channel_id: None,
            initial_status: UserTradeStatus::PendingActivation,
        }
    }

    #[test]
    fn create_honors_requested_initial_status() {
        let trade = UserTrade::create(UserTradeId::new(1), new_trade(), Utc::now()).unwrap();
        assert_eq!(trade.status, UserTradeStatus::PendingActivation);
    }

    #[test]
    fn invalidation_before_activation_has_no_pnl() {
        let mut trade = UserTrade::create(UserTradeId::new(1), new_trade(), Utc::now()).unwrap();
        trade.invalidate(dec!(2900), Utc::now()).unwrap();
        assert_eq!(trade.status, UserTradeStatus::Closed);
        assert_eq!(trade.exit_price, Some(dec!(2900)));
    }

    #[test]
    fn from_recommendation_mirrors_active_source() {
        let rec_new = crate::domain::recommendation::NewRecommendation {
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
        };
        let mut rec = Recommendation::create(RecommendationId::new(1), rec_new, Utc::now()).unwrap();
        rec.activate(Utc::now()).unwrap();

        let trade = UserTrade::from_recommendation(UserTradeId::new(1), UserId::new(7), &rec, Utc::now()).unwrap();
        assert_eq!(trade.status, UserTradeStatus::Activated);
        assert_eq!(trade.source_recommendation_id, Some(RecommendationId::new(1)));
    }

    #[test]
    fn from_recommendation_rejects_closed_source() {
        let rec_new = crate::domain::recommendation::NewRecommendation {
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
        };
        let mut rec = Recommendation::create(RecommendationId::new(1), rec_new, Utc::now()).unwrap();
        rec.invalidate(dec!(59000), Utc::now()).unwrap();
        assert!(matches!(
            UserTrade::from_recommendation(UserTradeId::new(1), UserId::new(7), &rec, Utc::now()),
            Err(DomainError::SourceAlreadyClosed)
        ));
        let _ = RecommendationStatus::Pending;
    }

    #[test]
    fn new_user_trade_from_recommendation_mirrors_pending_source() {
        let rec_new = crate::domain::recommendation::NewRecommendation {
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
        };
        let rec = Recommendation::create(RecommendationId::new(1), rec_new, Utc::now()).unwrap();

        let (new, activated_at) = NewUserTrade::from_recommendation(UserId::new(7), &rec, Utc::now()).unwrap();
        assert_eq!(new.initial_status, UserTradeStatus::PendingActivation);
        assert_eq!(new.source_recommendation_id, Some(RecommendationId::new(1)));
        assert!(activated_at.is_none());
    }

    #[test]
    fn new_user_trade_from_recommendation_rejects_closed_source() {
        let rec_new = crate::domain::recommendation::NewRecommendation {
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
        };
        let mut rec = Recommendation::create(RecommendationId::new(1), rec_new, Utc::now()).unwrap();
        rec.invalidate(dec!(59000), Utc::now()).unwrap();
        assert!(matches!(
            NewUserTrade::from_recommendation(UserId::new(7), &rec, Utc::now()),
            Err(DomainError::SourceAlreadyClosed)
        ));
    }
}
