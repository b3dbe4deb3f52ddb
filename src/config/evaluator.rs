//! Alert Evaluator configuration (§4.4, §6).

use serde::Deserialize;

/// Debounce tuning for the Alert Evaluator.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluatorConfig {
    /// Minimum seconds between two dispatches of the same `(entity, type)` pair.
    #[serde(default = "default_debounce_seconds")]
    pub debounce_seconds: f64,
}

fn default_debounce_seconds() -> f64 {
    1.0
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self { debounce_seconds: default_debounce_seconds() }
    }
}
