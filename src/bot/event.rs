//! Normalized inbound events
//!
//! Narrows a raw Telegram [`Update`] down to the two things the bot reacts
//! to: an intro command or a menu button tap. Everything else is ignored.

use teloxide::types::{CallbackQueryId, ChatId, MessageId, Update, UpdateKind};
use teloxide::utils::command::BotCommands;

/// Supported commands for the bot
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the intro and the course menu
    #[command(description = "Show the course menu.")]
    Start,
    /// Same as start
    #[command(description = "Show help and the course menu.")]
    Help,
}

/// Parse a message text into a [`Command`].
///
/// Accepts `/start`, `/help` and the `/start@SomeBot` form used in groups.
/// Trailing arguments are ignored.
#[must_use]
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split_once('@').map_or(name, |(name, _)| name);

    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        _ => None,
    }
}

/// An event the dispatcher acts upon
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// Intro command in a chat
    Command {
        /// Originating chat
        chat_id: ChatId,
        /// Parsed command
        command: Command,
    },
    /// Inline button tap
    Callback {
        /// Identifier used to acknowledge the tap
        callback_id: CallbackQueryId,
        /// Chat of the message carrying the button, if still accessible
        chat_id: Option<ChatId>,
        /// Opaque button payload
        data: Option<String>,
    },
}

impl InboundEvent {
    /// Extract an event from a raw update. Returns `None` for updates the bot
    /// does not handle (plain text, edits, other update kinds).
    #[must_use]
    pub fn from_update(update: &Update) -> Option<Self> {
        match &update.kind {
            UpdateKind::Message(msg) => {
                let command = parse_command(msg.text()?)?;
                Some(Self::Command {
                    chat_id: msg.chat.id,
                    command,
                })
            }
            UpdateKind::CallbackQuery(q) => Some(Self::Callback {
                callback_id: q.id.clone(),
                chat_id: q.message.as_ref().map(|msg| msg.chat().id),
                data: q.data.clone(),
            }),
            _ => None,
        }
    }

    /// Chat the event belongs to, when known
    #[must_use]
    pub const fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::Command { chat_id, .. } => Some(*chat_id),
            Self::Callback { chat_id, .. } => *chat_id,
        }
    }
}

/// The provisional status message of an in-flight delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage {
    /// Chat holding the message
    pub chat_id: ChatId,
    /// Message to edit later
    pub message_id: MessageId,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use teloxide::types::Update;

    pub(crate) fn message_update(text: &str) -> Update {
        let raw = serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1_700_000_000,
                "chat": { "id": 42, "type": "private", "first_name": "Ann" },
                "from": { "id": 42, "is_bot": false, "first_name": "Ann" },
                "text": text
            }
        });
        serde_json::from_str(&raw.to_string()).expect("valid message update")
    }

    pub(crate) fn callback_update(data: &str) -> Update {
        let raw = serde_json::json!({
            "update_id": 11,
            "callback_query": {
                "id": "cb-1",
                "from": { "id": 42, "is_bot": false, "first_name": "Ann" },
                "chat_instance": "ci-1",
                "data": data,
                "message": {
                    "message_id": 5,
                    "date": 1_700_000_000,
                    "chat": { "id": 42, "type": "private", "first_name": "Ann" },
                    "from": { "id": 7, "is_bot": true, "first_name": "CourseBot" },
                    "text": "menu"
                }
            }
        });
        serde_json::from_str(&raw.to_string()).expect("valid callback update")
    }
}
