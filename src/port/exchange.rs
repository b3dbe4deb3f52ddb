//! Per-exchange WebSocket tick feeds (§4.1, §6).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::watch;

use crate::Result;

/// Which upstream venue a tick originated from (§6 "Supported sources").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Binance,
    Bybit,
}

impl Source {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Source::Binance => "BINANCE",
            Source::Bybit => "BYBIT",
        }
    }
}

/// Which instrument type a tick's symbol was quoted on (§4.2, §4.4 tick
/// shape). Every feed in this build is spot-only; the tag is carried so a
/// future perpetuals adapter can stamp its ticks without changing the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketType {
    Spot,
    Perp,
}

impl MarketType {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            MarketType::Spot => "SPOT",
            MarketType::Perp => "PERP",
        }
    }
}

/// A normalized miniTicker-style tick: the high/low extrema observed since
/// the previous emitted tick for this symbol (§4.1, §4.2 enrichment tuple).
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub market: MarketType,
    pub low: Decimal,
    pub high: Decimal,
    pub source: Source,
    pub received_at: DateTime<Utc>,
}

/// Callback invoked once per decoded tick; owned by the Aggregator, shared
/// across every adapter it drives.
pub type TickHandler = Arc<dyn Fn(Tick) + Send + Sync>;

/// A resilient subscription to one exchange's aggregated ticker feed (§4.1).
///
/// `stream` does not return until `shutdown` fires or the handler itself
/// panics; reconnection, backoff, and the circuit breaker live entirely
/// inside the implementation and are invisible to callers.
#[async_trait]
pub trait ExchangeFeed: Send + Sync {
    fn source(&self) -> Source;

    /// Subscribe to exactly `symbols`, emitting every decoded tick to
    /// `handler`, until `shutdown` is set to `true`.
    async fn stream(
        &self,
        symbols: HashSet<String>,
        handler: TickHandler,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()>;
}

/// One-shot REST price lookup, used only by the Creation Service to fill in
/// an entry price for a `MARKET` order (§4.7 step 1, §5 "live-price fetch
/// during MARKET creation"). Kept separate from [`ExchangeFeed`] because it
/// is a single request/response call, not a long-lived subscription.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    fn source(&self) -> Source;

    async fn latest_price(&self, symbol: &str) -> Result<Decimal>;
}
