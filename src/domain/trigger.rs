//! In-memory price triggers derived from entity state (§3, §4.3).
//!
//! A [`Trigger`] is never persisted — it is recomputed from the authoritative
//! store on every rebuild so there is exactly one source of truth for "what
//! should fire."

use rust_decimal::Decimal;

use super::id::EntityKind;
use super::types::{OrderType, Side};

/// Which price level on an entity a trigger watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerType {
    Entry,
    Sl,
    ProfitStop,
    /// 1-indexed target number, matching the `TP{n}_HIT` event label.
    Tp(u32),
}

impl TriggerType {
    /// Tie-break order within one tick evaluation pass (§4.4): `ENTRY` → `SL` →
    /// `PROFIT_STOP` → `TP` ascending.
    #[must_use]
    pub fn evaluation_rank(&self) -> (u8, u32) {
        match self {
            TriggerType::Entry => (0, 0),
            TriggerType::Sl => (1, 0),
            TriggerType::ProfitStop => (2, 0),
            TriggerType::Tp(n) => (3, *n),
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        match self {
            TriggerType::Entry => "ENTRY".to_string(),
            TriggerType::Sl => "SL".to_string(),
            TriggerType::ProfitStop => "PROFIT_STOP".to_string(),
            TriggerType::Tp(n) => format!("TP{n}"),
        }
    }
}

/// A price-level predicate attached to an entity whose crossing should cause a
/// specific lifecycle transition. Derived, never stored.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub entity_kind: EntityKind,
    pub entity_id: i64,
    /// The analyst (Recommendation) or subscriber (UserTrade) who owns the entity,
    /// used only for notification routing — not compared for matching.
    pub owner_id: String,
    pub symbol: String,
    pub side: Side,
    pub trigger_type: TriggerType,
    pub price: Decimal,
    /// Only meaningful for `TriggerType::Entry`: selects the cross-direction.
    pub order_type: Option<OrderType>,
}

impl Trigger {
    /// Dedup key: triggers deriving from the same entity, type, and price are
    /// the same trigger (§4.3 "duplicate triggers ... are de-duplicated on build").
    #[must_use]
    pub fn dedup_key(&self) -> (EntityKind, i64, TriggerType, Decimal) {
        (self.entity_kind, self.entity_id, self.trigger_type, self.price)
    }

    /// `(entity_id, type)` pair used by the debounce map and idempotency checks.
    #[must_use]
    pub fn debounce_key(&self) -> (EntityKind, i64, TriggerType) {
        (self.entity_kind, self.entity_id, self.trigger_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trigger(trigger_type: TriggerType) -> Trigger {
        Trigger {
            entity_kind: EntityKind::Recommendation,
            entity_id: 1,
            owner_id: "analyst-1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Long,
            trigger_type,
            price: dec!(100),
            order_type: None,
        }
    }

    #[test]
    fn evaluation_order_is_entry_sl_profit_stop_tp_ascending() {
        let mut types = vec![
            TriggerType::Tp(2),
            TriggerType::ProfitStop,
            TriggerType::Tp(1),
            TriggerType::Entry,
            TriggerType::Sl,
        ];
        types.sort_by_key(TriggerType::evaluation_rank);
        assert_eq!(
            types,
            vec![TriggerType::Entry, TriggerType::Sl, TriggerType::ProfitStop, TriggerType::Tp(1), TriggerType::Tp(2)]
        );
    }

    #[test]
    fn dedup_key_distinguishes_by_type_and_price() {
        let a = trigger(TriggerType::Sl);
        let mut b = trigger(TriggerType::Sl);
        b.price = dec!(99);
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn debounce_key_ignores_price() {
        let a = trigger(TriggerType::Sl);
        let mut b = trigger(TriggerType::Sl);
        b.price = dec!(99);
        assert_eq!(a.debounce_key(), b.debounce_key());
    }
}
