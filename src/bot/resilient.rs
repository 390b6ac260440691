//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Wrappers around send/edit operations that retry transient network
//! failures with exponential backoff and jitter, plus a graceful report
//! editor that swallows the expected "message is not modified" and
//! "message to edit not found" responses.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, LinkPreviewOptions, Message, MessageId, ParseMode};
use tracing::{debug, warn};

/// Maximum message length for Telegram with safety margin.
/// Telegram's official limit is 4096, but we use 4000 to account for
/// escape sequences added by MarkdownV2 formatting.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

fn disabled_link_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// Send a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns an error once all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns an error once all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.edit_message_text(chat_id, msg_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await
}

/// Replace a report message in place: MarkdownV2, link preview disabled,
/// text truncated to the Telegram limit, expected edit errors swallowed.
///
/// # Returns
///
/// - `true` if the message was successfully edited
/// - `false` if the edit was skipped (not modified / not found) or failed
///   after retries
pub async fn edit_report_message(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
) -> bool {
    const ERROR_NOT_MODIFIED: &str = "message is not modified";
    const ERROR_NOT_FOUND: &str = "message to edit not found";

    let truncated = if text.chars().count() > TELEGRAM_MESSAGE_LIMIT {
        crate::utils::truncate_str(text, TELEGRAM_MESSAGE_LIMIT)
    } else {
        text.to_string()
    };

    let result = crate::utils::retry_telegram_operation(|| async {
        bot.edit_message_text(chat_id, msg_id, truncated.clone())
            .parse_mode(ParseMode::MarkdownV2)
            .link_preview_options(disabled_link_preview())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await;

    match result {
        Ok(_) => true,
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains(ERROR_NOT_MODIFIED) || err_msg.contains(ERROR_NOT_FOUND) {
                debug!("Report update skipped: {err_msg}");
            } else {
                warn!("Failed to edit report message after retries: {e}");
            }
            false
        }
    }
}
