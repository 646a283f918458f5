//! Telegram transport seam
//!
//! Everything the bot asks of the Bot API goes through [`Transport`], so the
//! dispatch state machine and the mode selector can be exercised without a
//! live network.

use crate::bot::effect::VideoDimensions;
use crate::bot::event::Command;
use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    AllowedUpdate, CallbackQueryId, ChatAction, InlineKeyboardMarkup, InputFile, MessageId,
    ParseMode,
};
use teloxide::utils::command::BotCommands;
use url::Url;

/// Update categories the webhook subscribes to
pub const ALLOWED_UPDATES: [AllowedUpdate; 2] =
    [AllowedUpdate::Message, AllowedUpdate::CallbackQuery];

/// Primitives the bot needs from the messaging platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an HTML message, optionally with an inline keyboard
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        menu: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId>;

    /// Send a streamable video fetched by Telegram from `url`
    async fn send_video(
        &self,
        chat_id: ChatId,
        url: Url,
        caption: String,
        dimensions: VideoDimensions,
    ) -> Result<()>;

    /// Show the "uploading video" indicator
    async fn send_upload_action(&self, chat_id: ChatId) -> Result<()>;

    /// Replace the text of a previously sent message
    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: String) -> Result<()>;

    /// Acknowledge a button tap, optionally with a short notice
    async fn answer_callback(&self, callback_id: CallbackQueryId, text: Option<String>)
        -> Result<()>;

    /// Register the webhook target
    async fn set_webhook(&self, url: Url, secret: Option<String>) -> Result<()>;

    /// Remove any registered webhook
    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()>;

    /// Publish the command list shown in the client's menu
    async fn set_commands(&self) -> Result<()>;
}

/// [`Transport`] backed by the Telegram Bot API
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Wrap a bot handle
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        menu: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        let mut req = self
            .bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html);
        if let Some(menu) = menu {
            req = req.reply_markup(menu);
        }
        let msg = req
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))?;
        Ok(msg.id)
    }

    async fn send_video(
        &self,
        chat_id: ChatId,
        url: Url,
        caption: String,
        dimensions: VideoDimensions,
    ) -> Result<()> {
        let mut req = self
            .bot
            .send_video(chat_id, InputFile::url(url))
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .supports_streaming(true);
        if let Some(width) = dimensions.width {
            req = req.width(width);
        }
        if let Some(height) = dimensions.height {
            req = req.height(height);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram video send error: {e}"))?;
        Ok(())
    }

    async fn send_upload_action(&self, chat_id: ChatId) -> Result<()> {
        self.bot
            .send_chat_action(chat_id, ChatAction::UploadVideo)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram chat action error: {e}"))?;
        Ok(())
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: String) -> Result<()> {
        self.bot
            .edit_message_text(chat_id, message_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: CallbackQueryId,
        text: Option<String>,
    ) -> Result<()> {
        let mut req = self.bot.answer_callback_query(callback_id);
        if let Some(text) = text {
            req = req.text(text);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram callback answer error: {e}"))?;
        Ok(())
    }

    async fn set_webhook(&self, url: Url, secret: Option<String>) -> Result<()> {
        let mut req = self
            .bot
            .set_webhook(url)
            .allowed_updates(ALLOWED_UPDATES.to_vec());
        if let Some(secret) = secret {
            req = req.secret_token(secret);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram setWebhook error: {e}"))?;
        Ok(())
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        self.bot
            .delete_webhook()
            .drop_pending_updates(drop_pending_updates)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram deleteWebhook error: {e}"))?;
        Ok(())
    }

    async fn set_commands(&self) -> Result<()> {
        self.bot
            .set_my_commands(Command::bot_commands())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram setMyCommands error: {e}"))?;
        Ok(())
    }
}
