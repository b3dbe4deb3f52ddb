//! Notification adapters implementing [`crate::port::Notifier`].

#[cfg(feature = "telegram")]
mod telegram;

#[cfg(feature = "telegram")]
pub use telegram::{TelegramConfig, TelegramNotifier};

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::port::notifier::{Keyboard, Notifier, RecommendationCard};

/// A no-op notifier — used when the `telegram` feature is disabled or a run
/// wants lifecycle transitions without touching the chat platform.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn post_to_channel(&self, _channel_id: &str, card: &RecommendationCard, _keyboard: &Keyboard) -> Result<String> {
        Ok(format!("null-{}", card.id))
    }

    async fn edit_card(&self, _channel_id: &str, _message_id: &str, _card: &RecommendationCard, _bot_username: &str) -> Result<()> {
        Ok(())
    }

    async fn post_reply(&self, _channel_id: &str, _message_id: &str, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn send_private_text(&self, _chat_id: &str, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Logs every call via `tracing` instead of calling out to a chat platform.
/// Useful for local runs and the CLI's `check` subcommand.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn post_to_channel(&self, channel_id: &str, card: &RecommendationCard, _keyboard: &Keyboard) -> Result<String> {
        info!(channel_id, symbol = %card.symbol, side = ?card.side, "post_to_channel");
        Ok(format!("log-{}", card.id))
    }

    async fn edit_card(&self, channel_id: &str, message_id: &str, card: &RecommendationCard, _bot_username: &str) -> Result<()> {
        info!(channel_id, message_id, status = %card.status, "edit_card");
        Ok(())
    }

    async fn post_reply(&self, channel_id: &str, message_id: &str, text: &str) -> Result<()> {
        info!(channel_id, message_id, text, "post_reply");
        Ok(())
    }

    async fn send_private_text(&self, chat_id: &str, text: &str) -> Result<()> {
        info!(chat_id, text, "send_private_text");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderType, ProfitStop, Side, Target};
    use rust_decimal_macros::dec;

    fn card() -> RecommendationCard {
        RecommendationCard {
            id: 1,
            symbol: "BTCUSDT".to_string(),
            side: Side::Long,
            entry_price: dec!(60000),
            stop_loss: dec!(59000),
            targets: vec![Target { price: dec!(61000), close_percent: dec!(100) }],
            order_type: OrderType::Limit,
            status: "PENDING".to_string(),
            open_size_percent: dec!(100),
            profit_stop: ProfitStop::disabled(),
        }
    }

    #[tokio::test]
    async fn null_notifier_returns_a_message_id() {
        let notifier = NullNotifier;
        let id = notifier.post_to_channel("chan", &card(), &Keyboard::default()).await.unwrap();
        assert!(id.starts_with("null-"));
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let notifier = LogNotifier;
        notifier.post_to_channel("chan", &card(), &Keyboard::default()).await.unwrap();
        notifier.edit_card("chan", "1", &card(), "bot").await.unwrap();
        notifier.post_reply("chan", "1", "hello").await.unwrap();
        notifier.send_private_text("42", "hi").await.unwrap();
    }
}
