//! Profit-stop and break-even tuning (§4.5, §6).

use rust_decimal::Decimal;
use serde::Deserialize;

fn default_breakeven_buffer_bps() -> Decimal {
    Decimal::new(5, 0)
}

/// Global knobs for the Lifecycle Service's risk-adjacent transitions.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Kill-switch: when `false`, `PROFIT_STOP` triggers are never derived.
    #[serde(default = "default_true")]
    pub profit_stop_enabled: bool,
    /// Fee buffer, in basis points, applied on the profit side when moving an
    /// SL to break-even.
    #[serde(default = "default_breakeven_buffer_bps")]
    pub breakeven_buffer_bps: Decimal,
}

const fn default_true() -> bool {
    true
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self { profit_stop_enabled: default_true(), breakeven_buffer_bps: default_breakeven_buffer_bps() }
    }
}
