//! The analyst-authored trade signal (§3) and its lifecycle transitions (§4.5).
//!
//! Transition methods here mutate an in-memory copy and return the
//! [`EventKind`] to append; they do not know about locking, the event log's
//! idempotency history, or persistence — that orchestration is
//! [`crate::service::lifecycle::LifecycleService`]'s job. Keeping the
//! transition arithmetic on the entity itself means the same rules apply
//! whether the caller is the Evaluator, an operator command, or a test.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{ChannelId, RecommendationId};
use super::types::{CloseReason, ExitStrategy, OrderType, ProfitStop, RecommendationStatus, Side, Target};

/// Fields required to construct a brand-new Recommendation, before an id or
/// timestamps are assigned.
#[derive(Debug, Clone)]
pub struct NewRecommendation {
    pub analyst_id: String,
    pub channel_id: Option<ChannelId>,
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub targets: Vec<Target>,
    pub order_type: OrderType,
    pub exit_strategy: ExitStrategy,
    pub profit_stop: ProfitStop,
}

/// An analyst's signal, tracked from `PENDING` through `ACTIVE` to `CLOSED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub analyst_id: String,
    pub channel_id: Option<ChannelId>,
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub targets: Vec<Target>,
    pub order_type: OrderType,
    pub status: RecommendationStatus,
    pub open_size_percent: Decimal,
    pub exit_strategy: ExitStrategy,
    pub profit_stop: ProfitStop,
    pub exit_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Not yet indexed or published (§4.7 shadow-then-publish protocol).
    pub is_shadow: bool,
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

impl NewRecommendation {
    /// Validate the §3 creation invariants without constructing an entity.
    /// Used by the Creation Service before persisting (§4.7 step 1).
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
}

impl Recommendation {
    /// Construct a freshly created, shadow, `PENDING` recommendation (§4.7 step 2).
    pub fn create(id: RecommendationId, new: NewRecommendation, now: DateTime<Utc>) -> Result<Self, DomainError> {
        new.validate()?;
        Ok(Self {
            id,
            analyst_id: new.analyst_id,
            channel_id: new.channel_id,
            symbol: new.symbol,
            side: new.side,
            entry_price: new.entry_price,
            stop_loss: new.stop_loss,
            targets: new.targets,
            order_type: new.order_type,
            status: RecommendationStatus::Pending,
            open_size_percent: Decimal::ONE_HUNDRED,
            exit_strategy: new.exit_strategy,
            profit_stop: new.profit_stop,
            exit_price: None,
            created_at: now,
            activated_at: None,
            closed_at: None,
            updated_at: now,
            is_shadow: true,
        })
    }

    /// Construct a freshly created, shadow, already-`ACTIVE` recommendation —
    /// a `MARKET` order fills immediately, so there is no `PENDING` window to
    /// wait out and the `CREATED_ACTIVE` event is the only creation event (§4.7, §8).
    pub fn create_active(id: RecommendationId, new: NewRecommendation, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let mut rec = Self::create(id, new, now)?;
        rec.status = RecommendationStatus::Active;
        rec.activated_at = Some(now);
        Ok(rec)
    }

    /// Final (1-indexed) target number, used to decide `CLOSE_AT_FINAL_TP` (§4.5).
    #[must_use]
    pub fn final_target_index(&self) -> Option<u32> {
        if self.targets.is_empty() {
            None
        } else {
            Some(self.targets.len() as u32)
        }
    }

    /// `PENDING → ACTIVE` (§4.5 Activate).
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<super::event::EventKind, DomainError> {
        if self.status != RecommendationStatus::Pending {
            return Err(DomainError::AlreadyClosed);
        }
        self.status = RecommendationStatus::Active;
        self.activated_at = Some(now);
        self.updated_at = now;
        Ok(super::event::EventKind::Activated)
    }

    /// `PENDING → CLOSED` via SL touched before entry (§4.5 Invalidate).
    pub fn invalidate(&mut self, sl_price: Decimal, now: DateTime<Utc>) -> Result<super::event::EventKind, DomainError> {
        if self.status != RecommendationStatus::Pending {
            return Err(DomainError::AlreadyClosed);
        }
        self.status = RecommendationStatus::Closed;
        self.exit_price = Some(sl_price);
        self.closed_at = Some(now);
        self.open_size_percent = Decimal::ZERO;
        self.updated_at = now;
        Ok(super::event::EventKind::Invalidated { exit_price: sl_price })
    }

    /// Record that target `index` was hit. Idempotency against the event log is
    /// the caller's responsibility (§4.5 "idempotency — if already in event log, return").
    pub fn record_tp_hit(&mut self, index: u32, now: DateTime<Utc>) -> super::event::EventKind {
        self.updated_at = now;
        super::event::EventKind::TpHit { index }
    }

    /// Reduce `open_size_percent` and record the PnL on the closed slice (§4.5 Partial Close).
    pub fn partial_close(&mut self, percent: Decimal, exit_price: Decimal, now: DateTime<Utc>) -> Result<super::event::EventKind, DomainError> {
        if self.status != RecommendationStatus::Active {
            return Err(DomainError::NotActive);
        }
        let clamped = percent.clamp(Decimal::ZERO, self.open_size_percent);
        self.open_size_percent -= clamped;
        let pnl_percent = self.side.pnl_percent(self.entry_price, exit_price);
        self.updated_at = now;
        Ok(super::event::EventKind::Partial { percent: clamped, exit_price, pnl_percent })
    }

    /// Whether the remaining open size is small enough to auto-close (§4.5: `< 0.1`).
    #[must_use]
    pub fn is_residual_closeable(&self) -> bool {
        self.open_size_percent < Decimal::new(1, 1)
    }

    /// `ACTIVE → CLOSED` for any reason (§4.5 Close).
    pub fn close(&mut self, reason: CloseReason, exit_price: Decimal, now: DateTime<Utc>) -> super::event::EventKind {
        self.status = RecommendationStatus::Closed;
        self.exit_price = Some(exit_price);
        self.closed_at = Some(now);
        self.open_size_percent = Decimal::ZERO;
        self.profit_stop.active = false;
        self.updated_at = now;
        super::event::EventKind::FinalClose { reason, exit_price }
    }

    /// Update the stop-loss. Deliberately does not re-check entry ordering:
    /// break-even and trailing moves legitimately relax it post-activation (§8.6).
    pub fn update_stop_loss(&mut self, new_sl: Decimal, now: DateTime<Utc>) -> Result<super::event::EventKind, DomainError> {
        validate_price(new_sl)?;
        self.stop_loss = new_sl;
        self.updated_at = now;
        Ok(super::event::EventKind::SlUpdated { stop_loss: new_sl })
    }

    /// Update the entry price; only legal while `PENDING` (§4.5).
    pub fn update_entry(&mut self, new_entry: Decimal, now: DateTime<Utc>) -> Result<super::event::EventKind, DomainError> {
        if self.status != RecommendationStatus::Pending {
            return Err(DomainError::EntryEditNotAllowed);
        }
        validate_price(new_entry)?;
        self.entry_price = new_entry;
        self.updated_at = now;
        Ok(super::event::EventKind::EntryUpdated { entry: new_entry })
    }

    /// Replace the target ladder, re-validating against the (possibly just-updated) entry.
    pub fn update_targets(&mut self, targets: Vec<Target>, now: DateTime<Utc>) -> Result<super::event::EventKind, DomainError> {
        validate_targets(self.side, self.entry_price, &targets)?;
        self.targets = targets;
        self.updated_at = now;
        Ok(super::event::EventKind::TpUpdated)
    }

    pub fn set_exit_strategy(&mut self, strategy: ExitStrategy, now: DateTime<Utc>) -> super::event::EventKind {
        self.exit_strategy = strategy;
        self.updated_at = now;
        super::event::EventKind::ExitStrategyUpdated
    }

    /// Move the stop-loss to entry ± a fee buffer on the profit side (§4.5, `BREAKEVEN_BUFFER_BPS`).
    pub fn move_sl_to_breakeven(&mut self, buffer_bps: Decimal, now: DateTime<Utc>) -> Result<super::event::EventKind, DomainError> {
        if self.status != RecommendationStatus::Active {
            return Err(DomainError::NotActive);
        }
        let buffer = self.entry_price * buffer_bps / Decimal::new(10_000, 0);
        let new_sl = match self.side {
            Side::Long => self.entry_price + buffer,
            Side::Short => self.entry_price - buffer,
        };
        self.stop_loss = new_sl;
        self.updated_at = now;
        Ok(super::event::EventKind::SlUpdated { stop_loss: new_sl })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_long() -> NewRecommendation {
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

    #[test]
    fn create_starts_pending_and_shadow() {
        let rec = Recommendation::create(RecommendationId::new(1), new_long(), Utc::now()).unwrap();
        assert_eq!(rec.status, RecommendationStatus::Pending);
        assert!(rec.is_shadow);
        assert_eq!(rec.open_size_percent, dec!(100));
    }

    #[test]
    fn long_stop_loss_must_be_below_entry() {
        let mut new = new_long();
        new.stop_loss = dec!(61000);
        assert!(matches!(new.validate(), Err(DomainError::LongStopAboveEntry { .. })));
    }

    #[test]
    fn long_target_must_be_above_entry() {
        let mut new = new_long();
        new.targets = vec![Target { price: dec!(59000), close_percent: dec!(100) }];
        assert!(matches!(new.validate(), Err(DomainError::LongTargetBelowEntry { .. })));
    }

    #[test]
    fn short_side_requires_inverse_ordering() {
        let new = NewRecommendation {
            side: Side::Short,
            entry_price: dec!(3000),
            stop_loss: dec!(3100),
            targets: vec![Target { price: dec!(2900), close_percent: dec!(100) }],
            ..new_long()
        };
        assert!(new.validate().is_ok());
    }

    #[test]
    fn targets_cannot_exceed_100_percent() {
        let mut new = new_long();
        new.targets = vec![
            Target { price: dec!(61000), close_percent: dec!(60) },
            Target { price: dec!(62000), close_percent: dec!(60) },
        ];
        assert!(matches!(new.validate(), Err(DomainError::TargetsExceed100 { .. })));
    }

    #[test]
    fn empty_targets_rejected() {
        let mut new = new_long();
        new.targets = vec![];
        assert!(matches!(new.validate(), Err(DomainError::EmptyTargets)));
    }

    #[test]
    fn activation_then_final_tp_auto_close_scenario() {
        // §8 end-to-end scenario 1.
        let mut rec = Recommendation::create(RecommendationId::new(1), new_long(), Utc::now()).unwrap();
        let now = Utc::now();
        rec.activate(now).unwrap();
        assert_eq!(rec.status, RecommendationStatus::Active);

        rec.record_tp_hit(1, now);
        rec.partial_close(dec!(100), dec!(61000), now).unwrap();
        assert!(rec.is_residual_closeable());

        rec.close(CloseReason::AutoCloseFinalTp, dec!(61000), now);
        assert_eq!(rec.status, RecommendationStatus::Closed);
        assert_eq!(rec.exit_price, Some(dec!(61000)));
        assert_eq!(rec.open_size_percent, Decimal::ZERO);
    }

    #[test]
    fn sl_invalidation_before_entry_scenario() {
        // §8 end-to-end scenario 2.
        let new = NewRecommendation {
            side: Side::Short,
            entry_price: dec!(3000),
            stop_loss: dec!(3100),
            targets: vec![Target { price: dec!(2900), close_percent: dec!(100) }],
            ..new_long()
        };
        let mut rec = Recommendation::create(RecommendationId::new(1), new, Utc::now()).unwrap();
        let now = Utc::now();
        rec.invalidate(dec!(3100), now).unwrap();
        assert_eq!(rec.status, RecommendationStatus::Closed);
        assert_eq!(rec.exit_price, Some(dec!(3100)));
    }

    #[test]
    fn partial_then_closure_via_residual_scenario() {
        // §8 end-to-end scenario 3.
        let new = NewRecommendation {
            entry_price: dec!(100),
            stop_loss: dec!(95),
            targets: vec![
                Target { price: dec!(110), close_percent: dec!(50) },
                Target { price: dec!(120), close_percent: dec!(50) },
            ],
            ..new_long()
        };
        let mut rec = Recommendation::create(RecommendationId::new(1), new, Utc::now()).unwrap();
        let now = Utc::now();
        rec.activate(now).unwrap();

        rec.record_tp_hit(1, now);
        rec.partial_close(dec!(50), dec!(110), now).unwrap();
        assert_eq!(rec.open_size_percent, dec!(50));
        assert!(!rec.is_residual_closeable());

        rec.record_tp_hit(2, now);
        rec.partial_close(dec!(50), dec!(120), now).unwrap();
        assert_eq!(rec.open_size_percent, Decimal::ZERO);
        assert!(rec.is_residual_closeable());
    }

    #[test]
    fn break_even_move_scenario() {
        // §8 end-to-end scenario 4.
        let mut rec = Recommendation::create(RecommendationId::new(1), new_long(), Utc::now()).unwrap();
        rec.activate(Utc::now()).unwrap();
        let event = rec.move_sl_to_breakeven(dec!(5), Utc::now()).unwrap();
        assert_eq!(rec.stop_loss, dec!(60030));
        assert!(matches!(event, super::super::event::EventKind::SlUpdated { stop_loss } if stop_loss == dec!(60030)));
    }

    #[test]
    fn entry_edit_rejected_once_active() {
        let mut rec = Recommendation::create(RecommendationId::new(1), new_long(), Utc::now()).unwrap();
        rec.activate(Utc::now()).unwrap();
        assert!(matches!(rec.update_entry(dec!(61000), Utc::now()), Err(DomainError::EntryEditNotAllowed)));
    }

    #[test]
    fn closed_entity_immutable_to_activation() {
        let mut rec = Recommendation::create(RecommendationId::new(1), new_long(), Utc::now()).unwrap();
        rec.invalidate(dec!(59000), Utc::now()).unwrap();
        assert!(matches!(rec.activate(Utc::now()), Err(DomainError::AlreadyClosed)));
    }
}
