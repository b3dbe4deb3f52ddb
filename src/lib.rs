//! Signalkeeper - a real-time trade-signal lifecycle engine.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── domain/    # Pure domain types: Recommendation, UserTrade, Trigger, events
//! ├── port/      # Traits the core depends on (store, notifier, exchange feed)
//! ├── adapter/   # Concrete implementations of the ports (sqlite, telegram, ws)
//! ├── service/   # The four core subsystems: aggregator, index, evaluator, lifecycle
//! ├── config/    # Layered configuration
//! ├── app/       # Wires services + adapters into a running system
//! └── cli/       # Command-line entrypoint
//! ```
//!
//! # Features
//!
//! - `telegram` - Enable Telegram notifications (default)

pub mod adapter;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;
pub mod service;

pub use error::{Error, Result};
