//! Outbound effects
//!
//! The dispatcher decides *what* to do as plain [`Effect`] values built by
//! the pure constructors below; [`Effect::apply`] is the only place that
//! talks to the transport.

use crate::bot::transport::Transport;
use crate::bot::views::{menu_keyboard, CourseView, DefaultCourseView};
use crate::catalog::{Catalog, ContentDescriptor};
use crate::config::DeliveryConfig;
use anyhow::Result;
use teloxide::types::{CallbackQueryId, ChatId, InlineKeyboardMarkup, MessageId};
use url::Url;

/// Optional pixel dimensions attached to a video reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoDimensions {
    /// Width in pixels
    pub width: Option<u32>,
    /// Height in pixels
    pub height: Option<u32>,
}

impl VideoDimensions {
    /// Dimensions for `descriptor`; its own values take precedence over the
    /// configured defaults, per axis.
    #[must_use]
    pub fn for_descriptor(descriptor: &ContentDescriptor, delivery: &DeliveryConfig) -> Self {
        Self {
            width: descriptor.width.or(delivery.default_width),
            height: descriptor.height.or(delivery.default_height),
        }
    }
}

/// A single outbound action
#[derive(Debug, Clone)]
pub enum Effect {
    /// Send a text message
    Reply {
        /// Target chat
        chat_id: ChatId,
        /// HTML text
        text: String,
        /// Optional inline keyboard
        menu: Option<InlineKeyboardMarkup>,
    },
    /// Send a video by URL
    SendVideo {
        /// Target chat
        chat_id: ChatId,
        /// Delivery URL
        url: String,
        /// Caption
        caption: String,
        /// Optional dimensions
        dimensions: VideoDimensions,
    },
    /// Acknowledge a button tap
    AnswerCallback {
        /// Callback to acknowledge
        callback_id: CallbackQueryId,
        /// Optional toast text
        text: Option<String>,
    },
    /// Replace the text of an existing message
    EditMessage {
        /// Chat holding the message
        chat_id: ChatId,
        /// Message to edit
        message_id: MessageId,
        /// New HTML text
        text: String,
    },
}

impl Effect {
    /// Intro text and course menu, the answer to `/start` and `/help`
    #[must_use]
    pub fn menu(chat_id: ChatId, catalog: &Catalog) -> Self {
        Self::Reply {
            chat_id,
            text: DefaultCourseView::intro_message().to_string(),
            menu: Some(menu_keyboard(catalog)),
        }
    }

    /// Neutral notice for a payload that matches nothing
    #[must_use]
    pub fn unknown_option(callback_id: CallbackQueryId) -> Self {
        Self::AnswerCallback {
            callback_id,
            text: Some(DefaultCourseView::unknown_option().to_string()),
        }
    }

    /// Silent acknowledgment that stops the client's loading spinner
    #[must_use]
    pub const fn acknowledge(callback_id: CallbackQueryId) -> Self {
        Self::AnswerCallback {
            callback_id,
            text: None,
        }
    }

    /// Provisional "sending" status
    #[must_use]
    pub fn sending(chat_id: ChatId, descriptor: &ContentDescriptor) -> Self {
        Self::Reply {
            chat_id,
            text: DefaultCourseView::sending_status(&descriptor.label),
            menu: None,
        }
    }

    /// The video itself. The caption is sent as HTML, so it is escaped here.
    #[must_use]
    pub fn video(
        chat_id: ChatId,
        url: &str,
        descriptor: &ContentDescriptor,
        delivery: &DeliveryConfig,
    ) -> Self {
        Self::SendVideo {
            chat_id,
            url: url.to_string(),
            caption: html_escape::encode_text(&descriptor.caption).into_owned(),
            dimensions: VideoDimensions::for_descriptor(descriptor, delivery),
        }
    }

    /// "Not available yet" notice
    #[must_use]
    pub fn not_available(chat_id: ChatId) -> Self {
        Self::Reply {
            chat_id,
            text: DefaultCourseView::not_available().to_string(),
            menu: None,
        }
    }

    /// "Failed, try again" notice
    #[must_use]
    pub fn delivery_failed(chat_id: ChatId) -> Self {
        Self::Reply {
            chat_id,
            text: DefaultCourseView::delivery_failed().to_string(),
            menu: None,
        }
    }

    /// Execute the effect. Returns the id of a newly sent text message.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or an error if a video URL is malformed.
    pub async fn apply(self, transport: &dyn Transport) -> Result<Option<MessageId>> {
        match self {
            Self::Reply {
                chat_id,
                text,
                menu,
            } => transport.send_text(chat_id, text, menu).await.map(Some),
            Self::SendVideo {
                chat_id,
                url,
                caption,
                dimensions,
            } => {
                let url = Url::parse(&url)
                    .map_err(|e| anyhow::anyhow!("Invalid delivery URL: {e}"))?;
                transport
                    .send_video(chat_id, url, caption, dimensions)
                    .await
                    .map(|()| None)
            }
            Self::AnswerCallback { callback_id, text } => transport
                .answer_callback(callback_id, text)
                .await
                .map(|()| None),
            Self::EditMessage {
                chat_id,
                message_id,
                text,
            } => transport
                .edit_text(chat_id, message_id, text)
                .await
                .map(|()| None),
        }
    }
}
