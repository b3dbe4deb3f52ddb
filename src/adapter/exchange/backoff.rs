//! Exponential backoff and circuit breaker shared by every exchange adapter
//! (§4.1, §6 `ADAPTER_BACKOFF_BASE`/`ADAPTER_BACKOFF_CAP`).
//!
//! Adapted from the reconnect state machine used for Polymarket's stream,
//! generalized to any venue rather than wrapping a specific `MarketDataStream`.

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open { until: Instant },
}

pub struct Backoff {
    base_ms: u64,
    cap_ms: u64,
    breaker_threshold: u32,
    cooldown: Duration,
    current_delay_ms: u64,
    consecutive_failures: u32,
    state: CircuitState,
}

impl Backoff {
    #[must_use]
    pub fn new(base_ms: u64, cap_ms: u64, breaker_threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            base_ms,
            cap_ms,
            breaker_threshold,
            cooldown: Duration::from_secs(cooldown_secs),
            current_delay_ms: base_ms,
            consecutive_failures: 0,
            state: CircuitState::Closed,
        }
    }

    fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.current_delay_ms = self.base_ms;
        self.state = CircuitState::Closed;
    }

    fn next_delay(&mut self) -> Duration {
        let delay = Duration::from_millis(self.current_delay_ms);
        self.current_delay_ms = (self.current_delay_ms * 2).min(self.cap_ms);
        delay
    }

    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            info!("exchange adapter recovered, resetting backoff");
        }
        self.reset();
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.breaker_threshold {
            let until = Instant::now() + self.cooldown;
            self.state = CircuitState::Open { until };
            error!(
                failures = self.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "circuit breaker tripped, pausing reconnection attempts"
            );
        }
    }

    /// Wait out whatever the circuit breaker and backoff currently demand
    /// before the caller attempts its next connection.
    pub async fn wait(&mut self) {
        if let CircuitState::Open { until } = self.state {
            let remaining = until.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                info!("circuit breaker cooldown expired");
                self.reset();
            } else {
                warn!(remaining_secs = remaining.as_secs(), "circuit breaker open, waiting for cooldown");
                tokio::time::sleep(remaining).await;
                self.reset();
                return;
            }
        }

        let delay = self.next_delay();
        if delay > Duration::from_millis(self.base_ms) || self.consecutive_failures > 0 {
            warn!(delay_ms = delay.as_millis(), attempt = self.consecutive_failures + 1, "reconnecting after delay");
        }
        tokio::time::sleep(delay).await;
    }
}
