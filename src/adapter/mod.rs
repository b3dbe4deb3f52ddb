//! Concrete implementations of the [`crate::port`] traits.
//!
//! - [`store`]: the Diesel/SQLite-backed [`port::Store`](crate::port::Store)
//! - [`exchange`]: per-venue [`port::ExchangeFeed`](crate::port::ExchangeFeed) implementations
//! - [`notifier`]: the Telegram [`port::Notifier`](crate::port::Notifier)

pub mod exchange;
pub mod notifier;
pub mod store;
