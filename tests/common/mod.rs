//! Shared fakes for integration tests.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use course_video_bot::bot::effect::VideoDimensions;
use course_video_bot::bot::transport::Transport;
use course_video_bot::storage::{ObjectStore, StorageError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use teloxide::types::{CallbackQueryId, ChatId, InlineKeyboardMarkup, MessageId};
use url::Url;

/// A transport call as seen by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Text { chat: i64, text: String, with_menu: bool },
    Video { chat: i64, url: String, caption: String, dimensions: VideoDimensions },
    UploadAction { chat: i64 },
    Edit { chat: i64, message: i32, text: String },
    Answer { text: Option<String> },
    SetWebhook { url: String, secret: Option<String> },
    DeleteWebhook { drop_pending: bool },
    SetCommands,
}

/// Records every call; `fail_video` and `fail_edit` inject errors,
/// `edit_delay` slows down message edits
#[derive(Default)]
pub struct RecordingTransport {
    pub calls: Mutex<Vec<Call>>,
    pub next_message_id: AtomicUsize,
    pub fail_video: bool,
    pub fail_edit: bool,
    pub edit_delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("lock").push(call);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        menu: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        self.record(Call::Text {
            chat: chat_id.0,
            text,
            with_menu: menu.is_some(),
        });
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 100;
        Ok(MessageId(i32::try_from(id).expect("small id")))
    }

    async fn send_video(
        &self,
        chat_id: ChatId,
        url: Url,
        caption: String,
        dimensions: VideoDimensions,
    ) -> Result<()> {
        self.record(Call::Video {
            chat: chat_id.0,
            url: url.to_string(),
            caption,
            dimensions,
        });
        if self.fail_video {
            anyhow::bail!("Bad Request: wrong file identifier/HTTP URL specified");
        }
        Ok(())
    }

    async fn send_upload_action(&self, chat_id: ChatId) -> Result<()> {
        self.record(Call::UploadAction { chat: chat_id.0 });
        Ok(())
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: String) -> Result<()> {
        if let Some(delay) = self.edit_delay {
            tokio::time::sleep(delay).await;
        }
        self.record(Call::Edit {
            chat: chat_id.0,
            message: message_id.0,
            text,
        });
        if self.fail_edit {
            anyhow::bail!("Bad Request: message to edit not found");
        }
        Ok(())
    }

    async fn answer_callback(&self, _callback_id: CallbackQueryId, text: Option<String>) -> Result<()> {
        self.record(Call::Answer { text });
        Ok(())
    }

    async fn set_webhook(&self, url: Url, secret: Option<String>) -> Result<()> {
        self.record(Call::SetWebhook {
            url: url.to_string(),
            secret,
        });
        Ok(())
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        self.record(Call::DeleteWebhook {
            drop_pending: drop_pending_updates,
        });
        Ok(())
    }

    async fn set_commands(&self) -> Result<()> {
        self.record(Call::SetCommands);
        Ok(())
    }
}

/// Object store that signs with a counter and can be told to fail
#[derive(Default)]
pub struct CountingStore {
    pub signed: AtomicUsize,
    pub fail_signing: bool,
    pub public_base: Option<String>,
}

impl CountingStore {
    pub fn sign_calls(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<String, StorageError> {
        let n = self.signed.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_signing {
            return Err(StorageError::Presign("signing disabled".to_string()));
        }
        Ok(format!(
            "https://cdn.example/{bucket}/{path}?X-Amz-Expires={}&sig={n}",
            ttl.as_secs()
        ))
    }

    fn public_url(&self, _bucket: &str, path: &str) -> Option<String> {
        self.public_base.as_ref().map(|base| format!("{base}/{path}"))
    }
}

/// Raw callback-query update as Telegram would POST it
pub fn callback_update_json(update_id: u32, data: &str) -> serde_json::Value {
    serde_json::json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb-{update_id}"),
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
    })
}
