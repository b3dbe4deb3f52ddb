//! Notifier adapter configuration (§4.6, §6).

use serde::Deserialize;

/// Telegram bot credentials and kill-switch.
///
/// `bot_token` is never read from the config file — only from the
/// `TELOXIDE_TOKEN` environment variable, consistent with secrets never
/// living in `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip)]
    pub bot_token: Option<String>,
    /// Opaque username passed through to `edit_card` (§4.6); the core never
    /// inspects it, only forwards it to the notifier adapter.
    #[serde(default)]
    pub bot_username: String,
    /// Broadcast channels every new Recommendation is fanned out to, in
    /// addition to its own `channel_id` if set (§4.7 step 3).
    #[serde(default)]
    pub broadcast_channel_ids: Vec<i64>,
}
