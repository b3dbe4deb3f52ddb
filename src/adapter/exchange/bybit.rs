//! Bybit v5 public ticker feed (§4.1, §6).

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

const URL: &str = "wss://stream.bybit.com/v5/public/spot";
const REST_URL: &str = "https://api.bybit.com/v5/market/tickers";

#[derive(Debug, Deserialize)]
struct TickerEnvelope {
    topic: Option<String>,
    data: Option<TickerData>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    symbol: String,
    #[serde(rename = "highPrice24h")]
    high: Option<Decimal>,
    #[serde(rename = "lowPrice24h")]
    low: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct RestResponse {
    result: RestResult,
}

#[derive(Debug, Deserialize)]
struct RestResult {
    list: Vec<RestTicker>,
}

#[derive(Debug, Deserialize)]
struct RestTicker {
    #[serde(rename = "lastPrice")]
    last_price: Decimal,
}

fn subscribe_frame(symbols: &HashSet<String>) -> String {
    let args: Vec<String> = symbols.iter().map(|s| format!("tickers.{}", s.to_uppercase())).collect();
    serde_json::json!({ "op": "subscribe", "args": args }).to_string()
}

/// `ExchangeFeed` for Bybit's v5 public spot ticker channel.
///
/// Unlike Binance, Bybit requires an explicit `op: subscribe` frame after
/// the connection handshake, and tickers deltas may omit `high`/`low` on
/// snapshots that don't carry a 24h-extrema change — those frames are
/// dropped rather than emitted as a tick with fabricated extrema.
pub struct BybitFeed {
    backoff_base_ms: u64,
    backoff_cap_ms: u64,
    circuit_breaker_threshold: u32,
    circuit_breaker_cooldown_secs: u64,
    http: reqwest::Client,
}

impl BybitFeed {
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
impl PriceLookup for BybitFeed {
    fn source(&self) -> Source {
        Source::Bybit
    }

    async fn latest_price(&self, symbol: &str) -> Result<Decimal> {
        let response: RestResponse = self
            .http
            .get(REST_URL)
            .query(&[("category", "spot"), ("symbol", &symbol.to_uppercase())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response
            .result
            .list
            .first()
            .map(|t| t.last_price)
            .ok_or_else(|| crate::error::Error::Adapter(format!("Bybit returned no ticker for {symbol}")))
    }
}

#[async_trait]
impl ExchangeFeed for BybitFeed {
    fn source(&self) -> Source {
        Source::Bybit
    }

    async fn stream(&self, symbols: HashSet<String>, handler: TickHandler, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if symbols.is_empty() {
            return Ok(());
        }

        let subscribe_msg = subscribe_frame(&symbols);
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

            info!(url = URL, "connecting to Bybit public ticker stream");
            let ws = match connect_async(URL).await {
                Ok((ws, _response)) => ws,
                Err(e) => {
                    warn!(error = %e, "Bybit connection failed");
                    backoff.record_failure();
                    backoff.wait().await;
                    continue;
                }
            };

            let (mut write, mut read) = ws.split();
            if let Err(e) = write.send(Message::Text(subscribe_msg.clone())).await {
                warn!(error = %e, "Bybit subscribe frame failed to send");
                backoff.record_failure();
                backoff.wait().await;
                continue;
            }
            backoff.record_success();

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
                                match serde_json::from_str::<TickerEnvelope>(&text) {
                                    Ok(envelope) if envelope.topic.as_deref().is_some_and(|t| t.starts_with("tickers.")) => {
                                        if let Some(data) = envelope.data {
                                            if let (Some(low), Some(high)) = (data.low, data.high) {
                                                handler(Tick {
                                                    symbol: data.symbol,
                                                    market: MarketType::Spot,
                                                    low,
                                                    high,
                                                    source: Source::Bybit,
                                                    received_at: Utc::now(),
                                                });
                                            }
                                        }
                                    }
                                    Ok(_) => {}
                                    Err(e) => debug!(error = %e, raw = %text, "failed to parse Bybit ticker frame"),
                                }
                            }
                            Some(Ok(Message::Ping(payload))) => {
                                let _ = write.send(Message::Pong(payload)).await;
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!(frame = ?frame, "Bybit closed the connection");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "Bybit WebSocket error");
                                backoff.record_failure();
                                break;
                            }
                            None => {
                                warn!("Bybit stream ended unexpectedly");
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
    fn subscribe_frame_uppercases_symbols() {
        let mut symbols = HashSet::new();
        symbols.insert("btcusdt".to_string());
        let frame = subscribe_frame(&symbols);
        assert!(frame.contains("tickers.BTCUSDT"));
    }

    #[test]
    fn ticker_envelope_parses_snapshot() {
        let raw = r#"{"topic":"tickers.BTCUSDT","ts":1,"type":"snapshot","data":{"symbol":"BTCUSDT","lastPrice":"60000","highPrice24h":"61000","lowPrice24h":"58000"}}"#;
        let envelope: TickerEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data.unwrap().symbol, "BTCUSDT");
    }
}
