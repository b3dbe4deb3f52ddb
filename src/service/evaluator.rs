//! Alert Evaluator (§4.4): turns ticks into lifecycle transitions.
//!
//! Reads a per-symbol snapshot from the Trigger Index, applies the §4.4
//! condition table, and dispatches hits to the Lifecycle Service in a fixed
//! tie-break order so that a single tick crossing several levels at once
//! resolves deterministically.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::domain::{EntityKind, OrderType, Side, Trigger, TriggerType};
use crate::port::exchange::Tick;
use crate::service::index::TriggerIndex;
use crate::service::lifecycle::LifecycleService;

type DebounceKey = (EntityKind, i64, TriggerType);

/// Whether `tick` crosses `trigger`'s price, per the §4.4 condition table
/// (bounds are inclusive: a tick that lands exactly on the level fires it).
fn is_hit(trigger: &Trigger, tick: &Tick) -> bool {
    match trigger.trigger_type {
        TriggerType::Entry => match trigger.order_type {
            Some(OrderType::Limit) => match trigger.side {
                Side::Long => tick.low <= trigger.price,
                Side::Short => tick.high >= trigger.price,
            },
            Some(OrderType::StopMarket) => match trigger.side {
                Side::Long => tick.high >= trigger.price,
                Side::Short => tick.low <= trigger.price,
            },
            // MARKET orders are never derived as an ENTRY trigger (§4.3): they
            // start ACTIVE, so there is no awaiting-entry phase to watch for.
            Some(OrderType::Market) | None => false,
        },
        TriggerType::Sl | TriggerType::ProfitStop => match trigger.side {
            Side::Long => tick.low <= trigger.price,
            Side::Short => tick.high >= trigger.price,
        },
        TriggerType::Tp(_) => match trigger.side {
            Side::Long => tick.high >= trigger.price,
            Side::Short => tick.low <= trigger.price,
        },
    }
}

/// The Alert Evaluator (§4.4). Owns the debounce map; reads the Trigger
/// Index; dispatches into the Lifecycle Service.
pub struct AlertEvaluator {
    index: Arc<TriggerIndex>,
    lifecycle: Arc<LifecycleService>,
    debounce: Mutex<HashMap<DebounceKey, DateTime<Utc>>>,
    debounce_window: Duration,
}

impl AlertEvaluator {
    #[must_use]
    pub fn new(index: Arc<TriggerIndex>, lifecycle: Arc<LifecycleService>, debounce_seconds: f64) -> Self {
        Self {
            index,
            lifecycle,
            debounce: Mutex::new(HashMap::new()),
            debounce_window: Duration::from_secs_f64(debounce_seconds.max(0.0)),
        }
    }

    /// Long-lived consumer loop over the aggregator's tick channel (§5).
    /// `Lagged` is the expected shape of the lossy-newest policy, not an
    /// error: older ticks were dropped in favor of newer ones under load.
    pub async fn run(&self, mut ticks: broadcast::Receiver<Tick>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                result = ticks.recv() => match result {
                    Ok(tick) => self.handle_tick(tick).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "evaluator dropped ticks under lag, lossy-newest by design");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn handle_tick(&self, tick: Tick) {
        let mut triggers = self.index.snapshot(&tick.symbol);
        triggers.sort_by_key(|t| t.trigger_type.evaluation_rank());

        let mut fired_this_tick = std::collections::HashSet::new();
        for trigger in &triggers {
            if !is_hit(trigger, &tick) {
                continue;
            }
            let key = trigger.debounce_key();
            if !fired_this_tick.insert(key) {
                continue;
            }
            if self.is_debounced(key, tick.received_at) {
                continue;
            }
            self.mark_fired(key, tick.received_at);
            self.dispatch(trigger, &tick).await;
        }
    }

    fn is_debounced(&self, key: DebounceKey, at: DateTime<Utc>) -> bool {
        match self.debounce.lock().get(&key) {
            Some(last) => (at - *last).to_std().map(|elapsed| elapsed < self.debounce_window).unwrap_or(false),
            None => false,
        }
    }

    fn mark_fired(&self, key: DebounceKey, at: DateTime<Utc>) {
        self.debounce.lock().insert(key, at);
    }

    async fn dispatch(&self, trigger: &Trigger, tick: &Tick) {
        let (kind, id) = (trigger.entity_kind, trigger.entity_id);
        let result = match trigger.trigger_type {
            TriggerType::Entry => self.lifecycle.on_entry_hit(kind, id, tick).await,
            TriggerType::Sl => self.lifecycle.on_sl_hit(kind, id, trigger.price, tick.received_at).await,
            TriggerType::ProfitStop => self.lifecycle.on_profit_stop_hit(kind, id, trigger.price, tick.received_at).await,
            TriggerType::Tp(index) => self.lifecycle.on_tp_hit(kind, id, index, trigger.price, tick.received_at).await,
        };
        if let Err(err) = result {
            warn!(
                entity_kind = %kind,
                entity_id = id,
                trigger = trigger.trigger_type.label(),
                error = %err,
                "lifecycle transition failed for fired trigger"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderType, Side};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn trigger(trigger_type: TriggerType, side: Side, price: rust_decimal::Decimal, order_type: Option<OrderType>) -> Trigger {
        Trigger {
            entity_kind: EntityKind::Recommendation,
            entity_id: 1,
            owner_id: "analyst-1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side,
            trigger_type,
            price,
            order_type,
        }
    }

    fn tick(low: rust_decimal::Decimal, high: rust_decimal::Decimal) -> Tick {
        Tick {
            symbol: "BTCUSDT".to_string(),
            market: crate::port::exchange::MarketType::Spot,
            low,
            high,
            source: crate::port::exchange::Source::Binance,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn long_sl_fires_when_low_touches_or_crosses_below() {
        let t = trigger(TriggerType::Sl, Side::Long, dec!(100), None);
        assert!(is_hit(&t, &tick(dec!(100), dec!(105))));
        assert!(is_hit(&t, &tick(dec!(99), dec!(105))));
        assert!(!is_hit(&t, &tick(dec!(101), dec!(105))));
    }

    #[test]
    fn long_tp_fires_when_high_touches_or_crosses_above() {
        let t = trigger(TriggerType::Tp(1), Side::Long, dec!(110), None);
        assert!(is_hit(&t, &tick(dec!(105), dec!(110))));
        assert!(!is_hit(&t, &tick(dec!(105), dec!(109))));
    }

    #[test]
    fn short_entry_limit_fires_on_high_reaching_up_to_entry() {
        let t = trigger(TriggerType::Entry, Side::Short, dec!(100), Some(OrderType::Limit));
        assert!(is_hit(&t, &tick(dec!(95), dec!(100))));
        assert!(!is_hit(&t, &tick(dec!(95), dec!(99))));
    }

    #[test]
    fn long_entry_stop_market_fires_on_breakout_high() {
        let t = trigger(TriggerType::Entry, Side::Long, dec!(100), Some(OrderType::StopMarket));
        assert!(is_hit(&t, &tick(dec!(95), dec!(100))));
        assert!(!is_hit(&t, &tick(dec!(95), dec!(99))));
    }

    #[test]
    fn market_order_entry_never_fires() {
        let t = trigger(TriggerType::Entry, Side::Long, dec!(100), Some(OrderType::Market));
        assert!(!is_hit(&t, &tick(dec!(50), dec!(150))));
    }
}
