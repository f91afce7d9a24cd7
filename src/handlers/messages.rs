//! Message handlers
//!
//! Feeds plain text from private chats to the user's current form step.

use std::sync::Arc;
use teloxide::{prelude::*, types::Message};
use tracing::debug;

use crate::state::DialogueDriver;
use crate::utils::errors::{FormBuddyError, Result};
use super::deliver;

const TEXT_ONLY_TEXT: &str = "Please answer with a text message.";

/// Handle incoming non-command messages
pub async fn handle_message(bot: Bot, msg: Message, driver: Arc<DialogueDriver>) -> Result<()> {
    let user = msg.from.as_ref().ok_or_else(|| {
        FormBuddyError::InvalidInput("No user in message".to_string())
    })?;

    let user_id = user.id.0 as i64;
    let chat_id = msg.chat.id;

    // Group chatter is not part of any form
    if !chat_id.is_user() {
        return Ok(());
    }

    let Some(text) = msg.text() else {
        debug!(user_id = user_id, "Ignoring non-text message");
        bot.send_message(chat_id, TEXT_ONLY_TEXT).await?;
        return Ok(());
    };

    debug!(user_id = user_id, chat_id = ?chat_id, "Processing message");
    let reply = driver.handle_message(user_id, text).await;
    deliver(&bot, chat_id, reply).await
}
