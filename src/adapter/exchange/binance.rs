//! Binance combined miniTicker feed (§4.1, §6).

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::port::exchange::{ExchangeFeed, MarketType, PriceLookup, Source, Tick, TickHandler};

use super::backoff::Backoff;

const BASE_URL: &str = "wss://stream.binance.com:9443/stream";
const REST_URL: &str = "https://api.binance.com/api/v3/ticker/price";

#[derive(Debug, Deserialize)]
struct Envelope {
    data: MiniTicker,
}

#[derive(Debug, Deserialize)]
struct MiniTicker {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "l")]
    low: Decimal,
    #[serde(rename = "h")]
    high: Decimal,
}

#[derive(Debug, Deserialize)]
struct PriceTicker {
    price: Decimal,
}

fn stream_url(symbols: &HashSet<String>) -> String {
    let streams = symbols
        .iter()
        .map(|s| format!("{}@miniTicker", s.to_lowercase()))
        .collect::<Vec<_>>()
        .join("/");
    format!("{BASE_URL}?streams={streams}")
}

/// `ExchangeFeed` for Binance's combined-stream miniTicker endpoint.
///
/// Binance already multiplexes every requested symbol over one connection
/// (`?streams=a@miniTicker/b@miniTicker`), so there is no separate subscribe
/// frame to send after connecting, unlike Bybit's `op: subscribe` handshake.
pub struct BinanceFeed {
    backoff_base_ms: u64,
    backoff_cap_ms: u64,
    circuit_breaker_threshold: u32,
    circuit_breaker_cooldown_secs: u64,
    http: reqwest::Client,
}

impl BinanceFeed {
    #[must_use]
    pub fn new(backoff_base_ms: u64, backoff_cap_ms: u64, circuit_breaker_threshold: u32, circuit_breaker_cooldown_secs: u64) -> Self {
        Self {
            backoff_base_ms,
            backoff_cap_ms,
            circuit_breaker_threshold,
            circuit_breaker_cooldown_secs,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PriceLookup for BinanceFeed {
    fn source(&self) -> Source {
        Source::Binance
    }

    async fn latest_price(&self, symbol: &str) -> Result<Decimal> {
        let ticker: PriceTicker = self
            .http
            .get(REST_URL)
            .query(&[("symbol", symbol.to_uppercase())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(ticker.price)
    }
}

#[async_trait]
impl ExchangeFeed for BinanceFeed {
    fn source(&self) -> Source {
        Source::Binance
    }

    async fn stream(&self, symbols: HashSet<String>, handler: TickHandler, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if symbols.is_empty() {
            return Ok(());
        }

        let url = stream_url(&symbols);
        let mut backoff = Backoff::new(
            self.backoff_base_ms,
            self.backoff_cap_ms,
            self.circuit_breaker_threshold,
            self.circuit_breaker_cooldown_secs,
        );

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            info!(url = %url, "connecting to Binance miniTicker stream");
            let ws = match connect_async(&url).await {
                Ok((ws, _response)) => ws,
                Err(e) => {
                    warn!(error = %e, "Binance connection failed");
                    backoff.record_failure();
                    tokio::select! {
                        _ = backoff.wait() => continue,
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() { return Ok(()); }
                        }
                    }
                    continue;
                }
            };
            backoff.record_success();

            let (mut write, mut read) = ws.split();

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<Envelope>(&text) {
                                    Ok(envelope) => {
                                        let tick = Tick {
                                            symbol: envelope.data.symbol,
                                            market: MarketType::Spot,
                                            low: envelope.data.low,
                                            high: envelope.data.high,
                                            source: Source::Binance,
                                            received_at: Utc::now(),
                                        };
                                        handler(tick);
                                    }
                                    Err(e) => debug!(error = %e, raw = %text, "failed to parse Binance miniTicker frame"),
                                }
                            }
                            Some(Ok(Message::Ping(payload))) => {
                                let _ = write.send(Message::Pong(payload)).await;
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!(frame = ?frame, "Binance closed the connection");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "Binance WebSocket error");
                                backoff.record_failure();
                                break;
                            }
                            None => {
                                warn!("Binance stream ended unexpectedly");
                                backoff.record_failure();
                                break;
                            }
                        }
                    }
                }
            }

            if *shutdown.borrow() {
                return Ok(());
            }
            backoff.wait().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_joins_symbols_lowercase() {
        let mut symbols = HashSet::new();
        symbols.insert("BTCUSDT".to_string());
        let url = stream_url(&symbols);
        assert!(url.contains("btcusdt@miniTicker"));
    }

    #[test]
    fn envelope_parses_mini_ticker_payload() {
        let raw = r#"{"stream":"btcusdt@miniticker","data":{"e":"24hrMiniTicker","E":1,"s":"BTCUSDT","c":"60000","o":"59000","h":"61000","l":"58000","v":"1","q":"1"}}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data.symbol, "BTCUSDT");
        assert_eq!(envelope.data.high.to_string(), "61000");
    }
}
