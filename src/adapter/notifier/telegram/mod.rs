//! Telegram notifier adapter. Requires the `telegram` feature.

mod notifier;

pub use notifier::{TelegramConfig, TelegramNotifier};
