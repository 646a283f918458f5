//! Course menu UI components
//!
//! Contains the menu keyboard and every user-facing text of the delivery flow.
//! Texts are sent with HTML parse mode, so dynamic parts are escaped.

use crate::catalog::Catalog;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for course UI view rendering
pub trait CourseView {
    /// Intro shown above the menu for `/start` and `/help`
    fn intro_message() -> &'static str;

    /// Callback acknowledgment for a payload that matches no catalog entry
    fn unknown_option() -> &'static str;

    /// Provisional status while a video is being sent
    fn sending_status(label: &str) -> String;

    /// Status after a successful delivery
    fn sent_status(label: &str) -> String;

    /// Status when the video cannot be resolved
    fn unavailable_status(label: &str) -> String;

    /// Status after a failed delivery
    fn failed_status(label: &str) -> String;

    /// Message when the video has no usable URL yet
    fn not_available() -> &'static str;

    /// Message when Telegram rejected or timed out the upload
    fn delivery_failed() -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default English implementation of `CourseView`
pub struct DefaultCourseView;

impl CourseView for DefaultCourseView {
    fn intro_message() -> &'static str {
        r"👋 <b>Welcome to the VPS course!</b>

Pick a lesson below and I'll send you the video right here in the chat.
Use /help to bring this menu back at any time."
    }

    fn unknown_option() -> &'static str {
        "Unknown option. Send /start to refresh the menu."
    }

    fn sending_status(label: &str) -> String {
        format!("⏳ Sending <b>{}</b>…", escape(label))
    }

    fn sent_status(label: &str) -> String {
        format!("✅ <b>{}</b> sent.", escape(label))
    }

    fn unavailable_status(label: &str) -> String {
        format!("🚫 <b>{}</b> is not available.", escape(label))
    }

    fn failed_status(label: &str) -> String {
        format!("⚠️ Could not send <b>{}</b>.", escape(label))
    }

    fn not_available() -> &'static str {
        "🚧 This video is not available yet. Please check back later."
    }

    fn delivery_failed() -> &'static str {
        "❌ Failed to send the video. Please try again in a minute."
    }
}

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

/// One button per catalog entry, in catalog order.
///
/// The button payload is the catalog key, so a tap routes straight back to
/// the same descriptor through [`Catalog::lookup`].
#[must_use]
pub fn menu_keyboard(catalog: &Catalog) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        catalog
            .list_all()
            .iter()
            .map(|entry| {
                vec![InlineKeyboardButton::callback(
                    entry.label.clone(),
                    entry.key.clone(),
                )]
            })
            .collect::<Vec<_>>(),
    )
}
