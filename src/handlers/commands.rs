//! Command handlers
//!
//! Handles `/start [payload]`, `/cancel`, `/points` and `/help`.

use std::sync::Arc;
use teloxide::{prelude::*, types::Message, utils::command::BotCommands};
use tracing::debug;

use crate::state::DialogueDriver;
use crate::utils::errors::{FormBuddyError, Result};
use super::deliver;

const PRIVATE_ONLY_TEXT: &str = "Please message me privately to register.";

/// All available bot commands
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "FormBuddy commands:")]
pub enum Command {
    #[command(description = "Start registration (optionally with an invite code)")]
    Start(String),
    #[command(description = "Cancel the registration in progress")]
    Cancel,
    #[command(description = "Show your referral points")]
    Points,
    #[command(description = "Show help information")]
    Help,
}

/// Main command dispatcher
pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, driver: Arc<DialogueDriver>) -> Result<()> {
    let user = msg.from.as_ref().ok_or_else(|| {
        FormBuddyError::InvalidInput("No user in message".to_string())
    })?;

    let user_id = user.id.0 as i64;
    let chat_id = msg.chat.id;

    debug!(user_id = user_id, chat_id = ?chat_id, command = ?cmd, "Processing command");

    if !chat_id.is_user() {
        bot.send_message(chat_id, PRIVATE_ONLY_TEXT).await?;
        return Ok(());
    }

    let reply = match cmd {
        Command::Start(payload) => driver.start(user_id, Some(payload.as_str())).await,
        Command::Cancel => driver.cancel(user_id).await,
        Command::Points => driver.points(user_id).await,
        Command::Help => {
            bot.send_message(chat_id, Command::descriptions().to_string()).await?;
            return Ok(());
        }
    };

    deliver(&bot, chat_id, reply).await
}
