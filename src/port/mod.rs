//! Traits the core services depend on, implemented by concrete adapters.
//!
//! - [`store`]: the authoritative persistence layer (§6)
//! - [`exchange`]: per-exchange WebSocket tick feeds (§4.1, §6)
//! - [`notifier`]: the chat-platform notification surface (§4.6, §6)
//!
//! Keeping these as traits lets [`crate::service`] depend only on behavior,
//! never on `diesel`, `teloxide`, or `tokio-tungstenite` directly.

pub mod exchange;
pub mod notifier;
pub mod store;

pub use exchange::{ExchangeFeed, PriceLookup, Source, Tick, TickHandler};
pub use notifier::{Keyboard, Notifier, RecommendationCard};
pub use store::{Store, TriggerPhase, TriggerSource};
