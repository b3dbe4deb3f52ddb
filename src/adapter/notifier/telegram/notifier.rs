//! Telegram implementation of [`crate::port::Notifier`] (§4.6).
//!
//! Every call goes straight to the Bot API and is awaited — callers need the
//! message id back (to persist a [`crate::domain::PublishedMessage`]) so the
//! fire-and-forget mpsc-worker shape doesn't fit here.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, ReplyParameters};

use crate::error::{Error, Result};
use crate::port::notifier::{Keyboard, Notifier, RecommendationCard};

/// Bot token and nothing else — chat/channel ids are supplied per call since
/// a single bot serves every broadcast channel and every subscriber DM.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

impl TelegramConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELOXIDE_TOKEN").ok()?;
        Some(Self { bot_token })
    }
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    #[must_use]
    pub fn new(config: TelegramConfig) -> Self {
        Self { bot: Bot::new(config.bot_token) }
    }
}

fn render_card(card: &RecommendationCard) -> String {
    let mut lines = vec![
        format!("*{}* {:?}", card.symbol, card.side),
        format!("Entry: `{}`", card.entry_price),
        format!("Stop loss: `{}`", card.stop_loss),
    ];
    for (i, target) in card.targets.iter().enumerate() {
        lines.push(format!("TP{}: `{}` ({}%)", i + 1, target.price, target.close_percent));
    }
    lines.push(format!("Status: {}", card.status));
    if card.profit_stop.is_armed() {
        lines.push("Profit stop: armed".to_string());
    }
    lines.join("\n")
}

fn render_keyboard(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows = keyboard
        .0
        .iter()
        .map(|row| {
            row.iter()
                .map(|(label, data)| InlineKeyboardButton::callback(label.clone(), data.clone()))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

fn chat_id_of(raw: &str) -> Result<ChatId> {
    raw.parse::<i64>().map(ChatId).map_err(|e| Error::Notifier(format!("invalid chat id {raw}: {e}")))
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn post_to_channel(
        &self,
        channel_id: &str,
        card: &RecommendationCard,
        keyboard: &Keyboard,
    ) -> Result<String> {
        let chat_id = chat_id_of(channel_id)?;
        let message = self
            .bot
            .send_message(chat_id, render_card(card))
            .parse_mode(ParseMode::Markdown)
            .reply_markup(render_keyboard(keyboard))
            .await
            .map_err(|e| Error::Notifier(e.to_string()))?;
        Ok(message.id.0.to_string())
    }

    async fn edit_card(
        &self,
        channel_id: &str,
        message_id: &str,
        card: &RecommendationCard,
        _bot_username: &str,
    ) -> Result<()> {
        let chat_id = chat_id_of(channel_id)?;
        let msg_id = message_id
            .parse::<i32>()
            .map_err(|e| Error::Notifier(format!("invalid message id {message_id}: {e}")))?;
        self.bot
            .edit_message_text(chat_id, MessageId(msg_id), render_card(card))
            .parse_mode(ParseMode::Markdown)
            .await
            .map_err(|e| Error::Notifier(e.to_string()))?;
        Ok(())
    }

    async fn post_reply(&self, channel_id: &str, message_id: &str, text: &str) -> Result<()> {
        let chat_id = chat_id_of(channel_id)?;
        let msg_id = message_id
            .parse::<i32>()
            .map_err(|e| Error::Notifier(format!("invalid message id {message_id}: {e}")))?;
        self.bot
            .send_message(chat_id, text)
            .reply_parameters(ReplyParameters::new(MessageId(msg_id)))
            .await
            .map_err(|e| Error::Notifier(e.to_string()))?;
        Ok(())
    }

    async fn send_private_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let chat_id = chat_id_of(chat_id)?;
        self.bot.send_message(chat_id, text).await.map_err(|e| Error::Notifier(e.to_string()))?;
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

    #[test]
    fn render_card_includes_symbol_and_targets() {
        let text = render_card(&card());
        assert!(text.contains("BTCUSDT"));
        assert!(text.contains("TP1"));
    }

    #[test]
    fn chat_id_rejects_non_numeric() {
        assert!(chat_id_of("not-a-number").is_err());
    }
}
