//! Bot handlers module
//!
//! Thin teloxide adapter around the dialogue driver:
//! - Command handlers for `/start`, `/cancel`, `/points` and `/help`
//! - Message handlers that feed plain text to the current form step

pub mod commands;
pub mod messages;

use std::sync::Arc;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{error, warn};

use crate::state::{DialogueDriver, Reply};
use crate::utils::errors::Result;

pub use commands::{Command, handle_command};
pub use messages::handle_message;

type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;
type HandlerResult = std::result::Result<(), HandlerError>;

/// Build the update handler tree
pub fn schema() -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .branch(
            // Handle commands
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command_endpoint)
        )
        .branch(
            // Handle regular messages
            dptree::endpoint(message_endpoint)
        )
}

async fn command_endpoint(bot: Bot, msg: Message, cmd: Command, driver: Arc<DialogueDriver>) -> HandlerResult {
    if let Err(e) = handle_command(bot, msg, cmd, driver).await {
        error!(error = %e, "Error handling command");
        return Err(e.into());
    }
    Ok(())
}

async fn message_endpoint(bot: Bot, msg: Message, driver: Arc<DialogueDriver>) -> HandlerResult {
    if let Err(e) = handle_message(bot, msg, driver).await {
        error!(error = %e, "Error handling message");
        return Err(e.into());
    }
    Ok(())
}

/// Send a driver reply: the prompt to the originating chat, notifications to their users
pub async fn deliver(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<()> {
    bot.send_message(chat_id, reply.prompt.text).await?;

    for notice in reply.notifications {
        if let Err(e) = bot.send_message(ChatId(notice.user_id), notice.text).await {
            warn!(user_id = notice.user_id, error = %e, "Failed to deliver notification");
        }
    }

    Ok(())
}
