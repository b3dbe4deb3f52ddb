//! Shared value objects used by both Recommendation and UserTrade.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

/// How the entry price is meant to be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
}

/// What happens once the final target is hit while the position is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitStrategy {
    /// Close automatically once the final target fires.
    CloseAtFinalTp,
    /// Leave the remainder open; only an explicit Close ends it.
    ManualCloseOnly,
}

/// Trailing/fixed profit-stop mode. See §9 open question (c) on unit ambiguity:
/// `trailing_value` is always interpreted per `unit`, never guessed from magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfitStopMode {
    None,
    Fixed,
    Trailing,
}

/// Unit tag for a trailing profit-stop value, required explicitly rather than
/// inferred from magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrailingUnit {
    Percent,
    Absolute,
}

/// Optional profit-stop configuration attached to an active entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitStop {
    pub mode: ProfitStopMode,
    pub price: Option<Decimal>,
    pub trailing_value: Option<Decimal>,
    pub trailing_unit: Option<TrailingUnit>,
    pub active: bool,
}

impl ProfitStop {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            mode: ProfitStopMode::None,
            price: None,
            trailing_value: None,
            trailing_unit: None,
            active: false,
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.active && self.mode != ProfitStopMode::None && self.price.is_some()
    }
}

impl Default for ProfitStop {
    fn default() -> Self {
        Self::disabled()
    }
}

/// A single take-profit target: a price and the fraction of the position to
/// close when it is hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub price: Decimal,
    pub close_percent: Decimal,
}

/// Recommendation status taxonomy (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecommendationStatus {
    Pending,
    Active,
    Closed,
}

/// UserTrade status taxonomy (§3) — a superset of Recommendation's, since a
/// tracked copy can sit in a watchlist before any activation decision is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserTradeStatus {
    Watchlist,
    PendingActivation,
    Activated,
    Closed,
}

/// Reason recorded on a `FINAL_CLOSE` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    ManualClose,
    SlHit,
    AutoCloseFinalTp,
    ClosedViaPartial,
    /// Not named in the distilled close-reason list, but a profit-stop trigger
    /// (§4.3) closes the position the same way an SL hit does; kept distinct
    /// so the event log records which price level actually fired.
    ProfitStopHit,
}

impl Side {
    /// Directional percent PnL of moving from `entry` to `exit`.
    #[must_use]
    pub fn pnl_percent(self, entry: Decimal, exit: Decimal) -> Decimal {
        if entry.is_zero() {
            return Decimal::ZERO;
        }
        match self {
            Side::Long => (exit / entry - Decimal::ONE) * Decimal::ONE_HUNDRED,
            Side::Short => (entry / exit - Decimal::ONE) * Decimal::ONE_HUNDRED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn long_pnl_percent() {
        assert_eq!(Side::Long.pnl_percent(dec!(100), dec!(110)), dec!(10));
    }

    #[test]
    fn short_pnl_percent() {
        assert_eq!(Side::Short.pnl_percent(dec!(100), dec!(90)), dec!(11.11111111111111111111111111));
    }

    #[test]
    fn profit_stop_disabled_is_not_armed() {
        assert!(!ProfitStop::disabled().is_armed());
    }
}
