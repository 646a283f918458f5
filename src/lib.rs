#![deny(missing_docs)]
//! Telegram bot that delivers course videos from R2 object storage.

/// Telegram-facing bot layer: events, effects, dispatch.
pub mod bot;
/// Static content catalog.
pub mod catalog;
/// Application configuration.
pub mod config;
/// Logging setup with secret redaction.
pub mod logging;
/// Webhook vs. polling selection.
pub mod mode;
/// Delivery URL resolution and caching.
pub mod resolver;
/// Process entrypoint wiring.
pub mod runner;
/// Signal handling.
pub mod signal;
/// Object storage access.
pub mod storage;
/// HTTP front door and webhook gate.
pub mod webhook;
