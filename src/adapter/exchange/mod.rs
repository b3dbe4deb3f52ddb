//! Per-venue [`crate::port::ExchangeFeed`] implementations (§4.1, §6).

mod backoff;
mod binance;
mod bybit;

pub use binance::BinanceFeed;
pub use bybit::BybitFeed;
