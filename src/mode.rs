//! Webhook vs. long-polling selection
//!
//! The decision is a pure function of two inputs ([`select_mode`]);
//! [`ModeSelector`] applies it to the transport exactly once per process and
//! undoes it on shutdown.

use crate::bot::resilient::{retry_telegram_operation, RetryPolicy};
use crate::bot::transport::Transport;
use crate::config::{ConfigError, WebhookConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// How updates reach the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Telegram pushes updates to our HTTP endpoint
    Webhook,
    /// We pull updates with `getUpdates`
    Polling,
}

/// Result of the mode decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeDecision {
    /// Selected mode
    pub mode: DispatchMode,
    /// Polling was chosen only because no callback URL exists
    pub fallback_warning: bool,
}

/// Decide the dispatch mode.
///
/// `Some(true)` forces polling. Otherwise a callback URL selects the
/// webhook; without one the bot falls back to polling and flags it.
#[must_use]
pub const fn select_mode(force_polling: Option<bool>, callback_url_present: bool) -> ModeDecision {
    match (force_polling, callback_url_present) {
        (Some(true), _) => ModeDecision {
            mode: DispatchMode::Polling,
            fallback_warning: false,
        },
        (_, true) => ModeDecision {
            mode: DispatchMode::Webhook,
            fallback_warning: false,
        },
        (_, false) => ModeDecision {
            mode: DispatchMode::Polling,
            fallback_warning: true,
        },
    }
}

/// Owns the transport configuration for the lifetime of the process
pub struct ModeSelector {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    configured: AtomicBool,
    mode: OnceLock<DispatchMode>,
    torn_down: AtomicBool,
    shutdown: CancellationToken,
}

impl ModeSelector {
    /// Create a selector with the default retry policy
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_retry(transport, RetryPolicy::default())
    }

    /// Create a selector with an explicit retry policy
    #[must_use]
    pub fn with_retry(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            configured: AtomicBool::new(false),
            mode: OnceLock::new(),
            torn_down: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Select the mode and configure the transport for it.
    ///
    /// # Errors
    ///
    /// - `ConfigError::AlreadyConfigured` on a second call
    /// - `ConfigError::InvalidWebhookUrl` if the callback URL does not parse
    /// - `ConfigError::Transport` if Telegram rejects the (de)registration
    pub async fn select_and_configure(
        &self,
        config: &WebhookConfig,
    ) -> Result<DispatchMode, ConfigError> {
        if self.configured.swap(true, Ordering::SeqCst) {
            return Err(ConfigError::AlreadyConfigured);
        }

        let decision = select_mode(config.force_polling, config.url.is_some());
        if decision.fallback_warning {
            warn!("No webhook URL configured, falling back to long polling");
        }

        match decision.mode {
            DispatchMode::Webhook => {
                self.register_webhook(config.url.as_deref(), config.secret.clone())
                    .await?;
            }
            DispatchMode::Polling => {
                self.delete_webhook(true).await?;
                info!("Webhook removed, long polling will drop pending updates on start");
            }
        }

        if self.mode.set(decision.mode).is_err() {
            return Err(ConfigError::AlreadyConfigured);
        }
        info!(mode = ?decision.mode, "Dispatch mode configured");
        Ok(decision.mode)
    }

    async fn register_webhook(
        &self,
        url: Option<&str>,
        secret: Option<String>,
    ) -> Result<(), ConfigError> {
        let raw = url.ok_or(ConfigError::MissingWebhookUrl)?;
        let url = Url::parse(raw).map_err(|source| ConfigError::InvalidWebhookUrl {
            url: raw.to_string(),
            source,
        })?;

        // A stale registration would keep delivering its backlog
        self.delete_webhook(true).await?;

        if secret.is_none() {
            warn!("Webhook secret not configured, inbound requests will not be authenticated");
        }

        let transport = Arc::clone(&self.transport);
        retry_telegram_operation(self.retry, || {
            let transport = Arc::clone(&transport);
            let url = url.clone();
            let secret = secret.clone();
            async move { transport.set_webhook(url, secret).await }
        })
        .await
        .map_err(|e| ConfigError::Transport(e.to_string()))?;

        info!(url = %url, "Webhook registered");
        Ok(())
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), ConfigError> {
        let transport = Arc::clone(&self.transport);
        retry_telegram_operation(self.retry, || {
            let transport = Arc::clone(&transport);
            async move { transport.delete_webhook(drop_pending_updates).await }
        })
        .await
        .map_err(|e| ConfigError::Transport(e.to_string()))
    }

    /// The configured mode, once [`Self::select_and_configure`] succeeded
    #[must_use]
    pub fn mode(&self) -> Option<DispatchMode> {
        self.mode.get().copied()
    }

    /// Token cancelled by [`Self::teardown`]; update sources stop on it
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Undo the transport configuration. Safe to call more than once; only
    /// the first call has an effect.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            debug!("Teardown already done");
            return;
        }

        self.shutdown.cancel();

        match self.mode() {
            Some(DispatchMode::Webhook) => match self.delete_webhook(false).await {
                Ok(()) => info!("Webhook deregistered"),
                Err(e) => warn!("Failed to deregister webhook: {e}"),
            },
            Some(DispatchMode::Polling) => info!("Long polling stopped"),
            None => debug!("Teardown before mode selection, nothing to undo"),
        }
    }
}

impl Drop for ModeSelector {
    fn drop(&mut self) {
        if self.mode.get().is_some() && !self.torn_down.load(Ordering::SeqCst) {
            warn!("Mode selector dropped without teardown");
        }
    }
}
