//! The append-only lifecycle event log (§3, §8 idempotency law).
//!
//! Event rows are the only place "has this already happened to this entity"
//! is answered from — not a mutable flag on the entity itself. [`EventKind::label`]
//! produces the stable string (`TP1_HIT`, `ACTIVATED`, ...) that the store indexes
//! on and that [`crate::service::lifecycle`] consults before mutating state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{RecommendationId, UserTradeId};
use super::types::CloseReason;

/// One kind of thing that can happen to a Recommendation or UserTrade.
///
/// Serializes to a single JSON blob stored in the event row's `data` column;
/// [`EventKind::label`] is stored alongside as a plain column so the store can
/// query "does a `TP1_HIT` already exist for entity 42" without deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventKind {
    CreatedPending,
    CreatedActive,
    Activated,
    TpHit {
        index: u32,
    },
    SlHit,
    Partial {
        percent: Decimal,
        exit_price: Decimal,
        pnl_percent: Decimal,
    },
    SlUpdated {
        stop_loss: Decimal,
    },
    TpUpdated,
    EntryUpdated {
        entry: Decimal,
    },
    ExitStrategyUpdated,
    Invalidated {
        exit_price: Decimal,
    },
    FinalClose {
        reason: CloseReason,
        exit_price: Decimal,
    },
}

impl EventKind {
    /// Stable label matching the taxonomy named in §3 (`CREATED_*`, `TP{n}_HIT`, ...).
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            EventKind::CreatedPending => "CREATED_PENDING".to_string(),
            EventKind::CreatedActive => "CREATED_ACTIVE".to_string(),
            EventKind::Activated => "ACTIVATED".to_string(),
            EventKind::TpHit { index } => format!("TP{index}_HIT"),
            EventKind::SlHit => "SL_HIT".to_string(),
            EventKind::Partial { .. } => "PARTIAL".to_string(),
            EventKind::SlUpdated { .. } => "SL_UPDATED".to_string(),
            EventKind::TpUpdated => "TP_UPDATED".to_string(),
            EventKind::EntryUpdated { .. } => "ENTRY_UPDATED".to_string(),
            EventKind::ExitStrategyUpdated => "EXIT_STRATEGY_UPDATED".to_string(),
            EventKind::Invalidated { .. } => "INVALIDATED".to_string(),
            EventKind::FinalClose { .. } => "FINAL_CLOSE".to_string(),
        }
    }

    /// Whether this kind is one of the terminal/idempotent kinds the Lifecycle
    /// Service must check the log for before mutating state (§4.5, §8.5).
    #[must_use]
    pub fn is_idempotency_gated(&self) -> bool {
        matches!(
            self,
            EventKind::Activated
                | EventKind::TpHit { .. }
                | EventKind::Invalidated { .. }
                | EventKind::FinalClose { .. }
        )
    }
}

/// One row in a Recommendation's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEvent {
    pub id: i64,
    pub recommendation_id: RecommendationId,
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
}

/// One row in a UserTrade's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTradeEvent {
    pub id: i64,
    pub user_trade_id: UserTradeId,
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tp_hit_label_includes_index() {
        assert_eq!(EventKind::TpHit { index: 1 }.label(), "TP1_HIT");
        assert_eq!(EventKind::TpHit { index: 2 }.label(), "TP2_HIT");
    }

    #[test]
    fn idempotency_gated_kinds() {
        assert!(EventKind::Activated.is_idempotency_gated());
        assert!(EventKind::TpHit { index: 1 }.is_idempotency_gated());
        assert!(EventKind::Invalidated { exit_price: dec!(1) }.is_idempotency_gated());
        assert!(EventKind::FinalClose { reason: CloseReason::SlHit, exit_price: dec!(1) }.is_idempotency_gated());
        assert!(!EventKind::SlUpdated { stop_loss: dec!(1) }.is_idempotency_gated());
        assert!(!EventKind::TpUpdated.is_idempotency_gated());
    }
}
