/// Update routing and video delivery
pub mod dispatcher;
/// Outbound actions and their pure constructors
pub mod effect;
/// Normalized inbound events and bot commands
pub mod event;
/// Retry helpers for Telegram API calls
pub mod resilient;
/// Telegram transport seam
pub mod transport;
/// UI texts and keyboards
pub mod views;
