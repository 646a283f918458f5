//! Configuration and settings management
//!
//! Loads settings from environment variables (and optional config files),
//! resolves legacy aliases and normalizes optional numeric overrides.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default HTTP bind host
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
/// Default S3 region; R2 accepts `auto`
pub const DEFAULT_STORAGE_REGION: &str = "auto";

/// Errors that abort startup or mode configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Underlying loader failure
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    /// Neither the bot token nor its legacy alias is set
    #[error("TELEGRAM_BOT_TOKEN (or legacy TELEGRAM_TOKEN) is missing")]
    MissingBotToken,
    /// Webhook mode was requested without a callback URL
    #[error("Webhook mode selected but TELEGRAM_WEBHOOK_URL is not set")]
    MissingWebhookUrl,
    /// Callback URL could not be parsed
    #[error("Invalid webhook URL {url:?}: {source}")]
    InvalidWebhookUrl {
        /// Offending value
        url: String,
        /// Parser error
        source: url::ParseError,
    },
    /// Transport rejected webhook registration or removal
    #[error("Failed to configure Telegram transport: {0}")]
    Transport(String),
    /// Mode selection was invoked a second time
    #[error("Dispatch mode is already configured")]
    AlreadyConfigured,
}

/// Raw values as they appear in the environment.
///
/// Everything is kept as a string so malformed numbers degrade to "unset"
/// instead of failing the whole load.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct RawSettings {
    /// `TELEGRAM_BOT_TOKEN`
    pub telegram_bot_token: Option<String>,
    /// `TELEGRAM_TOKEN` (legacy alias)
    pub telegram_token: Option<String>,
    /// `TELEGRAM_WEBHOOK_URL`
    pub telegram_webhook_url: Option<String>,
    /// `WEBHOOK_URL` (legacy alias)
    pub webhook_url: Option<String>,
    /// `TELEGRAM_WEBHOOK_SECRET`
    pub telegram_webhook_secret: Option<String>,
    /// `TELEGRAM_USE_POLLING`
    pub telegram_use_polling: Option<String>,
    /// `R2_BUCKET_NAME`
    pub r2_bucket_name: Option<String>,
    /// `R2_ENDPOINT_URL`
    pub r2_endpoint_url: Option<String>,
    /// `R2_ACCESS_KEY_ID`
    pub r2_access_key_id: Option<String>,
    /// `R2_SECRET_ACCESS_KEY`
    pub r2_secret_access_key: Option<String>,
    /// `R2_REGION`
    pub r2_region: Option<String>,
    /// `R2_PUBLIC_BASE_URL`
    pub r2_public_base_url: Option<String>,
    /// `TELEGRAM_VIDEO_WIDTH`
    pub telegram_video_width: Option<String>,
    /// `TELEGRAM_VIDEO_HEIGHT`
    pub telegram_video_height: Option<String>,
    /// `TELEGRAM_HANDLER_TIMEOUT_MS`
    pub telegram_handler_timeout_ms: Option<String>,
    /// `HTTP_HOST`
    pub http_host: Option<String>,
    /// `PORT`
    pub port: Option<String>,
}

/// Inputs for the mode selector
#[derive(Clone, Default, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Public callback URL
    pub url: Option<String>,
    /// Shared secret expected in `x-telegram-bot-api-secret-token`
    pub secret: Option<String>,
    /// Tri-state polling override
    pub force_polling: Option<bool>,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url", &self.url)
            .field("secret", &self.secret.as_ref().map(|_| "[MASKED]"))
            .field("force_polling", &self.force_polling)
            .finish()
    }
}

/// Object storage settings
#[derive(Clone, Default)]
pub struct StorageConfig {
    /// Bucket holding the videos; `None` disables delivery
    pub bucket: Option<String>,
    /// Custom S3 endpoint (R2 account endpoint)
    pub endpoint_url: Option<String>,
    /// Access key id
    pub access_key_id: Option<String>,
    /// Secret access key
    pub secret_access_key: Option<String>,
    /// Signing region
    pub region: String,
    /// Base URL for permanent public links; may contain `{bucket}`
    pub public_base_url: Option<String>,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket", &self.bucket)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "[MASKED]"))
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[MASKED]"),
            )
            .field("region", &self.region)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

/// Delivery tuning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Fallback video width when a descriptor has none
    pub default_width: Option<u32>,
    /// Fallback video height when a descriptor has none
    pub default_height: Option<u32>,
    /// Upper bound for handling a single update
    pub handler_timeout: Option<Duration>,
}

/// Application settings
#[derive(Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,
    /// Webhook / polling selection inputs
    pub webhook: WebhookConfig,
    /// Object storage
    pub storage: StorageConfig,
    /// Delivery tuning
    pub delivery: DeliveryConfig,
    /// HTTP bind host
    pub http_host: String,
    /// HTTP bind port
    pub http_port: u16,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("telegram_token", &"[MASKED]")
            .field("webhook", &self.webhook)
            .field("storage", &self.storage)
            .field("delivery", &self.delivery)
            .field("http_host", &self.http_host)
            .field("http_port", &self.http_port)
            .finish()
    }
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the bot token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let raw: RawSettings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // UPPER_SNAKE_CASE env vars map to snake_case keys; empty values count as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?
            .try_deserialize()?;

        Self::from_raw(raw)
    }

    /// Apply precedence and normalization rules to raw values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingBotToken` if no token is configured.
    pub fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let telegram_token = pick_with_alias(
            "TELEGRAM_BOT_TOKEN",
            raw.telegram_bot_token,
            "TELEGRAM_TOKEN",
            raw.telegram_token,
        )
        .ok_or(ConfigError::MissingBotToken)?;

        let webhook = WebhookConfig {
            url: pick_with_alias(
                "TELEGRAM_WEBHOOK_URL",
                raw.telegram_webhook_url,
                "WEBHOOK_URL",
                raw.webhook_url,
            ),
            secret: non_empty(raw.telegram_webhook_secret),
            force_polling: parse_tristate(
                "TELEGRAM_USE_POLLING",
                raw.telegram_use_polling.as_deref(),
            ),
        };

        let storage = StorageConfig {
            bucket: non_empty(raw.r2_bucket_name),
            endpoint_url: non_empty(raw.r2_endpoint_url),
            access_key_id: non_empty(raw.r2_access_key_id),
            secret_access_key: non_empty(raw.r2_secret_access_key),
            region: non_empty(raw.r2_region).unwrap_or_else(|| DEFAULT_STORAGE_REGION.to_string()),
            public_base_url: non_empty(raw.r2_public_base_url),
        };

        let delivery = DeliveryConfig {
            default_width: parse_positive("TELEGRAM_VIDEO_WIDTH", raw.telegram_video_width.as_deref())
                .and_then(|v| u32::try_from(v).ok()),
            default_height: parse_positive(
                "TELEGRAM_VIDEO_HEIGHT",
                raw.telegram_video_height.as_deref(),
            )
            .and_then(|v| u32::try_from(v).ok()),
            handler_timeout: parse_positive(
                "TELEGRAM_HANDLER_TIMEOUT_MS",
                raw.telegram_handler_timeout_ms.as_deref(),
            )
            .map(Duration::from_millis),
        };

        let http_port = parse_positive("PORT", raw.port.as_deref())
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(DEFAULT_HTTP_PORT);

        Ok(Self {
            telegram_token,
            webhook,
            storage,
            delivery,
            http_host: non_empty(raw.http_host).unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string()),
            http_port,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve a primary key and its legacy alias. The primary key wins; a
/// conflicting alias is reported but never fatal.
#[must_use]
pub fn pick_with_alias(
    primary_name: &str,
    primary: Option<String>,
    alias_name: &str,
    alias: Option<String>,
) -> Option<String> {
    match (non_empty(primary), non_empty(alias)) {
        (Some(primary), Some(alias)) => {
            if primary != alias {
                warn!(
                    "Both {} and {} are set to different values; using {}",
                    primary_name, alias_name, primary_name
                );
            }
            Some(primary)
        }
        (Some(primary), None) => Some(primary),
        (None, alias) => alias,
    }
}

/// Parse a tri-state boolean flag. Unrecognized values are treated as unset.
#[must_use]
pub fn parse_tristate(name: &str, raw: Option<&str>) -> Option<bool> {
    let value = raw.map(str::trim).filter(|v| !v.is_empty())?;
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            warn!("Ignoring unrecognized value {:?} for {}", value, name);
            None
        }
    }
}

/// Parse a strictly positive integer override. Non-numeric or non-positive
/// values are ignored.
#[must_use]
pub fn parse_positive(name: &str, raw: Option<&str>) -> Option<u64> {
    let value = raw.map(str::trim).filter(|v| !v.is_empty())?;
    match value.parse::<i64>() {
        Ok(parsed) if parsed > 0 => u64::try_from(parsed).ok(),
        _ => {
            warn!("Ignoring non-positive or non-numeric value {:?} for {}", value, name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_token() -> RawSettings {
        RawSettings {
            telegram_bot_token: Some("123:abc".to_string()),
            ..RawSettings::default()
        }
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let result = Settings::from_raw(RawSettings::default());
        assert!(matches!(result, Err(ConfigError::MissingBotToken)));
    }

    #[test]
    fn test_legacy_token_alias_accepted() -> Result<(), ConfigError> {
        let raw = RawSettings {
            telegram_token: Some("legacy".to_string()),
            ..RawSettings::default()
        };
        assert_eq!(Settings::from_raw(raw)?.telegram_token, "legacy");
        Ok(())
    }

    #[test]
    fn test_primary_wins_over_alias() -> Result<(), ConfigError> {
        let raw = RawSettings {
            telegram_bot_token: Some("primary".to_string()),
            telegram_token: Some("legacy".to_string()),
            telegram_webhook_url: Some("https://a.example/telegram/webhook".to_string()),
            webhook_url: Some("https://b.example/telegram/webhook".to_string()),
            ..RawSettings::default()
        };
        let settings = Settings::from_raw(raw)?;
        assert_eq!(settings.telegram_token, "primary");
        assert_eq!(
            settings.webhook.url.as_deref(),
            Some("https://a.example/telegram/webhook")
        );
        Ok(())
    }

    #[test]
    fn test_blank_values_are_unset() -> Result<(), ConfigError> {
        let raw = RawSettings {
            telegram_webhook_url: Some("   ".to_string()),
            webhook_url: Some("https://legacy.example/hook".to_string()),
            telegram_webhook_secret: Some(String::new()),
            r2_bucket_name: Some(" ".to_string()),
            ..raw_with_token()
        };
        let settings = Settings::from_raw(raw)?;
        assert_eq!(
            settings.webhook.url.as_deref(),
            Some("https://legacy.example/hook")
        );
        assert_eq!(settings.webhook.secret, None);
        assert_eq!(settings.storage.bucket, None);
        Ok(())
    }

    #[test]
    fn test_tristate_parsing() {
        assert_eq!(parse_tristate("X", None), None);
        assert_eq!(parse_tristate("X", Some("")), None);
        assert_eq!(parse_tristate("X", Some("true")), Some(true));
        assert_eq!(parse_tristate("X", Some("TRUE")), Some(true));
        assert_eq!(parse_tristate("X", Some("1")), Some(true));
        assert_eq!(parse_tristate("X", Some("false")), Some(false));
        assert_eq!(parse_tristate("X", Some("0")), Some(false));
        assert_eq!(parse_tristate("X", Some("maybe")), None);
    }

    #[test]
    fn test_positive_overrides() -> Result<(), ConfigError> {
        let raw = RawSettings {
            telegram_video_width: Some("1280".to_string()),
            telegram_video_height: Some("-720".to_string()),
            telegram_handler_timeout_ms: Some("abc".to_string()),
            port: Some("0".to_string()),
            ..raw_with_token()
        };
        let settings = Settings::from_raw(raw)?;
        assert_eq!(settings.delivery.default_width, Some(1280));
        assert_eq!(settings.delivery.default_height, None);
        assert_eq!(settings.delivery.handler_timeout, None);
        assert_eq!(settings.http_port, DEFAULT_HTTP_PORT);
        Ok(())
    }

    #[test]
    fn test_timeout_in_millis() -> Result<(), ConfigError> {
        let raw = RawSettings {
            telegram_handler_timeout_ms: Some("2500".to_string()),
            ..raw_with_token()
        };
        let settings = Settings::from_raw(raw)?;
        assert_eq!(
            settings.delivery.handler_timeout,
            Some(Duration::from_millis(2500))
        );
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<(), ConfigError> {
        let settings = Settings::from_raw(raw_with_token())?;
        assert_eq!(settings.http_host, DEFAULT_HTTP_HOST);
        assert_eq!(settings.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(settings.storage.region, DEFAULT_STORAGE_REGION);
        assert_eq!(settings.webhook.force_polling, None);
        Ok(())
    }

    #[test]
    fn test_debug_masks_secrets() -> Result<(), ConfigError> {
        let raw = RawSettings {
            telegram_webhook_secret: Some("hunter2".to_string()),
            r2_secret_access_key: Some("s3cr3t".to_string()),
            ..raw_with_token()
        };
        let rendered = format!("{:?}", Settings::from_raw(raw)?);
        assert!(!rendered.contains("123:abc"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cr3t"));
        Ok(())
    }
}
