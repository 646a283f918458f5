//! Update dispatch and video delivery
//!
//! Every update is handled on its own task. Errors are caught at the update
//! boundary and logged with the update id; nothing a single update does can
//! stop the dispatcher.
//!
//! Callback flow:
//! `lookup -> acknowledge + provisional status -> resolve URL -> send video
//! -> best-effort status edit`. The optional time limit covers only the
//! resolve and send steps.

use crate::bot::effect::Effect;
use crate::bot::event::{InboundEvent, StatusMessage};
use crate::bot::transport::Transport;
use crate::bot::views::{CourseView, DefaultCourseView};
use crate::catalog::{Catalog, ContentDescriptor};
use crate::config::DeliveryConfig;
use crate::resolver::{UrlResolver, UrlSource};
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::{CallbackQueryId, ChatId, Update};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that abort the handling of a single update
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The configured per-update time limit elapsed
    #[error("Update handling timed out after {0:?}")]
    Timeout(Duration),
    /// A required transport call failed
    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

/// How an update was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Intro and menu sent
    MenuSent,
    /// Callback payload matched nothing
    UnknownOption,
    /// Video sent
    Delivered(UrlSource),
    /// No delivery URL could be produced
    Unavailable,
    /// Telegram rejected the video
    DeliveryFailed,
    /// Update not relevant to the bot
    Ignored,
}

enum Delivery {
    Sent(UrlSource),
    Unavailable,
    Failed(anyhow::Error),
    TimedOut(Duration),
}

/// Routes inbound events to catalog content and delivers it
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    catalog: Arc<Catalog>,
    resolver: Arc<UrlResolver>,
    bucket: Option<String>,
    delivery: DeliveryConfig,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// `bucket` of `None` makes every delivery unavailable.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        catalog: Arc<Catalog>,
        resolver: Arc<UrlResolver>,
        bucket: Option<String>,
        delivery: DeliveryConfig,
    ) -> Self {
        Self {
            transport,
            catalog,
            resolver,
            bucket,
            delivery,
        }
    }

    /// Handle `update` on a dedicated task and wait for it.
    ///
    /// A panic inside the handler is contained here and logged.
    pub async fn dispatch(self: Arc<Self>, update: Update) {
        let update_id = update.id.0;
        let this = Arc::clone(&self);
        let handle = tokio::spawn(async move { this.handle_update(&update).await });

        if let Err(e) = handle.await {
            error!(update_id, "Update handler crashed: {e}");
        }
    }

    /// Handle one raw update. Errors are logged with the update id before
    /// being returned.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted handling; the caller only needs it for
    /// inspection.
    pub async fn handle_update(&self, update: &Update) -> Result<Outcome, DispatchError> {
        let update_id = update.id.0;
        let Some(event) = InboundEvent::from_update(update) else {
            debug!(update_id, "Ignoring unsupported update");
            return Ok(Outcome::Ignored);
        };

        match self.handle_event(event).await {
            Ok(outcome) => {
                debug!(update_id, ?outcome, "Update handled");
                Ok(outcome)
            }
            Err(e) => {
                error!(update_id, error = %e, "Failed to handle update");
                Err(e)
            }
        }
    }

    /// Handle a normalized event.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Timeout` when video delivery exceeds the
    /// configured limit, or the transport error of a required reply.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<Outcome, DispatchError> {
        match event {
            InboundEvent::Command { chat_id, command } => {
                debug!(chat_id = chat_id.0, ?command, "Sending course menu");
                Effect::menu(chat_id, &self.catalog)
                    .apply(self.transport.as_ref())
                    .await?;
                Ok(Outcome::MenuSent)
            }
            InboundEvent::Callback {
                callback_id,
                chat_id,
                data,
            } => self.handle_callback(callback_id, chat_id, data).await,
        }
    }

    async fn handle_callback(
        &self,
        callback_id: CallbackQueryId,
        chat_id: Option<ChatId>,
        data: Option<String>,
    ) -> Result<Outcome, DispatchError> {
        let transport = self.transport.as_ref();

        let Some(descriptor) = data.as_deref().and_then(|key| self.catalog.lookup(key)) else {
            debug!(payload = ?data, "Unknown callback payload");
            Effect::unknown_option(callback_id).apply(transport).await?;
            return Ok(Outcome::UnknownOption);
        };

        if let Err(e) = Effect::acknowledge(callback_id).apply(transport).await {
            debug!(key = %descriptor.key, "Callback acknowledgment failed: {e}");
        }

        let Some(chat_id) = chat_id else {
            warn!(key = %descriptor.key, "Callback message is no longer accessible; nothing to reply to");
            return Ok(Outcome::Ignored);
        };

        let status = match Effect::sending(chat_id, descriptor).apply(transport).await {
            Ok(message_id) => message_id.map(|message_id| StatusMessage {
                chat_id,
                message_id,
            }),
            Err(e) => {
                warn!(key = %descriptor.key, error = %e, "Failed to send provisional status");
                None
            }
        };

        // The status edit stays outside the time limit
        let delivery = match self.delivery.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, self.deliver(chat_id, descriptor))
                .await
                .unwrap_or(Delivery::TimedOut(limit)),
            None => self.deliver(chat_id, descriptor).await,
        };

        match delivery {
            Delivery::Sent(source) => {
                info!(key = %descriptor.key, ?source, "Video delivered");
                self.attempt_edit(status, DefaultCourseView::sent_status(&descriptor.label))
                    .await;
                Ok(Outcome::Delivered(source))
            }
            Delivery::Unavailable => {
                info!(key = %descriptor.key, "Video unavailable");
                let sent = Effect::not_available(chat_id).apply(transport).await;
                self.attempt_edit(status, DefaultCourseView::unavailable_status(&descriptor.label))
                    .await;
                sent?;
                Ok(Outcome::Unavailable)
            }
            Delivery::Failed(e) => {
                warn!(
                    key = %descriptor.key,
                    path = %descriptor.storage_path,
                    error = %e,
                    "Failed to send video"
                );
                self.report_failure(chat_id, status, descriptor).await?;
                Ok(Outcome::DeliveryFailed)
            }
            Delivery::TimedOut(limit) => {
                warn!(key = %descriptor.key, timeout = ?limit, "Video delivery timed out");
                if let Err(e) = self.report_failure(chat_id, status, descriptor).await {
                    warn!(error = %e, "Failed to send timeout notice");
                }
                Err(DispatchError::Timeout(limit))
            }
        }
    }

    /// Resolve the URL and send the video; the part bounded by the timeout
    async fn deliver(&self, chat_id: ChatId, descriptor: &ContentDescriptor) -> Delivery {
        let transport = self.transport.as_ref();

        let Some(resolved) = self
            .resolver
            .resolve(self.bucket.as_deref(), descriptor)
            .await
        else {
            return Delivery::Unavailable;
        };

        if let Err(e) = transport.send_upload_action(chat_id).await {
            debug!(chat_id = chat_id.0, "Upload indicator failed: {e}");
        }

        let video = Effect::video(chat_id, &resolved.url, descriptor, &self.delivery);
        match video.apply(transport).await {
            Ok(_) => Delivery::Sent(resolved.source),
            Err(e) => Delivery::Failed(e),
        }
    }

    /// Failure notice plus the failed status edit
    async fn report_failure(
        &self,
        chat_id: ChatId,
        status: Option<StatusMessage>,
        descriptor: &ContentDescriptor,
    ) -> anyhow::Result<()> {
        let sent = Effect::delivery_failed(chat_id)
            .apply(self.transport.as_ref())
            .await;
        self.attempt_edit(status, DefaultCourseView::failed_status(&descriptor.label))
            .await;
        sent.map(|_| ())
    }

    /// Best-effort status edit. Failures are logged at debug level only.
    async fn attempt_edit(&self, status: Option<StatusMessage>, text: String) {
        let Some(status) = status else {
            return;
        };

        let edit = Effect::EditMessage {
            chat_id: status.chat_id,
            message_id: status.message_id,
            text,
        };
        if let Err(e) = edit.apply(self.transport.as_ref()).await {
            debug!(
                chat_id = status.chat_id.0,
                message_id = status.message_id.0,
                "Status update skipped: {e}"
            );
        }
    }
}
