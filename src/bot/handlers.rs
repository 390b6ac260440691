//! Command handlers.
//!
//! Each handler performs the user-visible side of one command; the audit
//! handler subscribes to the poller and translates its lifecycle events
//! into message edits.

use crate::analyzer::{AnalyzerClient, AuditEvent, AuditPoller};
use crate::bot::resilient::{edit_message_resilient, edit_report_message, send_message_resilient};
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};
use teloxide::utils::command::BotCommands;
use tracing::warn;

/// Commands understood by the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start working with the bot.")]
    Start,
    /// Full token statistics and AI-audit report
    #[command(description = "Full analysis of any erc20 smart contract.")]
    Audit(String),
    /// Register a wallet address
    #[command(description = "Register your wallet for air drops and early access.")]
    Register(String),
    /// Wallet PnL tracking (not live yet)
    #[command(description = "Track the PnL of any wallet.")]
    Performance,
    /// Trading bot (not live yet)
    #[command(description = "First one in, first one out.")]
    Block0,
}

const WELCOME_MESSAGE: &str = "🤖 Welcome to the LuckBlock Telegram bot! 🤖\n\n\
/audit - Full analysis of any erc20 smart contract.\n\n\
/performance - Track the PnL of any wallet (limited to uniswap v2 during BETA mode)\n\n\
/block0 - First one in, first one out. The fastest DeFi trading bot, guaranteed.\n\n\
/register - Register your wallet for air drops, early sniper access and more.";

const COMING_SOON_MESSAGE: &str = "Coming soon... 🔒";

/// Reply with the welcome message.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, WELCOME_MESSAGE).await?;
    Ok(())
}

/// Reply with the placeholder for commands that are not live yet.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn coming_soon(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, COMING_SOON_MESSAGE).await?;
    Ok(())
}

/// Register a wallet address.
///
/// The registration call is fire-and-forget: the acknowledgment goes out
/// regardless of the endpoint's outcome and failures are only logged.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn register(
    bot: Bot,
    msg: Message,
    client: Arc<AnalyzerClient>,
    address: String,
) -> Result<()> {
    let Some(address) = first_token(&address) else {
        bot.send_message(
            msg.chat.id,
            "Please provide a valid address (e.g. /register 0x1234...)",
        )
        .await?;
        return Ok(());
    };
    let address = address.to_string();

    tokio::spawn(async move {
        if let Err(e) = client.register_wallet(&address).await {
            warn!(address = %address, error = %e, "wallet registration call failed");
        }
    });

    bot.send_message(msg.chat.id, "Registered Successfully! ✅")
        .await?;
    Ok(())
}

/// Run the full audit flow for a contract address.
///
/// Sends the placeholder message, subscribes to the audit poller, and
/// consumes its events until the stream ends in a terminal state.
///
/// # Errors
///
/// Returns an error if the placeholder or validation reply cannot be sent.
pub async fn audit(
    bot: Bot,
    msg: Message,
    poller: Arc<AuditPoller>,
    address: String,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let Some(address) = first_token(&address) else {
        bot.send_message(chat_id, "Please provide a contract address")
            .await?;
        return Ok(());
    };

    let placeholder = bot.send_message(chat_id, "Loading insights...").await?;

    let mut events = poller.subscribe(address);
    let mut generation_msg: Option<MessageId> = None;
    while let Some(event) = events.recv().await {
        handle_audit_event(&bot, chat_id, placeholder.id, &mut generation_msg, event).await;
    }

    Ok(())
}

/// Extract the address argument: the first whitespace-separated token.
fn first_token(arg: &str) -> Option<&str> {
    arg.split_whitespace().next()
}

/// Translate one poller event into message edits.
///
/// The placeholder message holds the evolving report; a separate
/// generation-status message tracks the remote job and is deleted once the
/// final report lands.
async fn handle_audit_event(
    bot: &Bot,
    chat_id: ChatId,
    report_msg_id: MessageId,
    generation_msg: &mut Option<MessageId>,
    event: AuditEvent,
) {
    match event {
        AuditEvent::Report { text, complete } => {
            edit_report_message(bot, chat_id, report_msg_id, &text).await;
            if !complete {
                match send_message_resilient(bot, chat_id, "🔍 (audit generation AI): starting...", None)
                    .await
                {
                    Ok(message) => *generation_msg = Some(message.id),
                    Err(e) => warn!(error = %e, "failed to send generation status message"),
                }
            }
        }
        AuditEvent::StatusChanged { status } => {
            if let Some(msg_id) = generation_msg {
                let text = format!("🔍 (audit generation AI): {status}");
                if let Err(e) = edit_message_resilient(bot, chat_id, *msg_id, text, None).await {
                    warn!(error = %e, "failed to update generation status message");
                }
            }
        }
        AuditEvent::Ended { text } => {
            if let Some(msg_id) = generation_msg.take() {
                if let Err(e) = bot.delete_message(chat_id, msg_id).await {
                    warn!(error = %e, "failed to delete generation status message");
                }
            }
            edit_report_message(bot, chat_id, report_msg_id, &text).await;
        }
        AuditEvent::Errored { message, report } => {
            match generation_msg.as_ref() {
                Some(msg_id) => {
                    let text = format!("❌ Oops, something went wrong! ({message})");
                    if let Err(e) = edit_message_resilient(bot, chat_id, *msg_id, text, None).await
                    {
                        warn!(error = %e, "failed to report audit error");
                    }
                }
                None => {
                    if let Err(e) = edit_message_resilient(
                        bot,
                        chat_id,
                        report_msg_id,
                        "❌ Oops, something went wrong!",
                        None,
                    )
                    .await
                    {
                        warn!(error = %e, "failed to report audit error");
                    }
                }
            }
            if let Some(report) = report {
                edit_report_message(bot, chat_id, report_msg_id, &report).await;
            }
        }
    }
}
