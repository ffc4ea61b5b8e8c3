// ABOUTME: Outbound side of the Telegram adapter for one chat
// ABOUTME: Sends plain, HTML and yes/no keyboard messages with 4096-char chunking

use anyhow::{Context, Result};
use smarthomebot_core::traits::MessageContent;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};

/// Maximum message length for Telegram Bot API
const MAX_MESSAGE_LENGTH: usize = 4096;

const YES_LABEL: &str = "✅ Yes";
const NO_LABEL: &str = "❌ No";

/// A Telegram chat the bot can write to
#[derive(Debug, Clone)]
pub struct TelegramChat {
    chat_id: ChatId,
    bot: Bot,
}

impl TelegramChat {
    pub fn new(chat_id: ChatId, bot: Bot) -> Self {
        Self { chat_id, bot }
    }

    pub async fn send(&self, content: MessageContent) -> Result<()> {
        match content {
            MessageContent::Plain(text) => self.send_chunked(&text, None).await,
            MessageContent::Html { html, .. } => {
                self.send_chunked(&html, Some(ParseMode::Html)).await
            }
            MessageContent::Confirm { text, yes, no } => {
                self.bot
                    .send_message(self.chat_id, text)
                    .reply_markup(confirm_keyboard(yes, no))
                    .await
                    .context("Failed to send confirmation prompt")?;
                Ok(())
            }
        }
    }

    /// Replace a prompt's text and remove its keyboard
    pub async fn edit_prompt(&self, message_id: i32, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(self.chat_id, MessageId(message_id), text)
            .reply_markup(InlineKeyboardMarkup::new(
                Vec::<Vec<InlineKeyboardButton>>::new(),
            ))
            .await
            .context("Failed to edit confirmation prompt")?;
        Ok(())
    }

    /// Send a text message, splitting into chunks if it exceeds Telegram's limit
    async fn send_chunked(&self, text: &str, parse_mode: Option<ParseMode>) -> Result<()> {
        for chunk in chunk_text(text, MAX_MESSAGE_LENGTH) {
            let mut req = self.bot.send_message(self.chat_id, chunk);
            if let Some(pm) = parse_mode {
                req = req.parse_mode(pm);
            }
            req.await.context("Failed to send message")?;
        }
        Ok(())
    }
}

/// One row with the yes and no buttons
fn confirm_keyboard(yes: String, no: String) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(YES_LABEL, yes),
        InlineKeyboardButton::callback(NO_LABEL, no),
    ]])
}

/// Split text into chunks at line boundaries, falling back to char boundaries
fn chunk_text(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining);
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        // Try to split at a newline within the limit
        let split_at = remaining[..limit]
            .rfind('\n')
            .map(|pos| pos + 1)
            .unwrap_or(limit);

        chunks.push(&remaining[..split_at]);
        remaining = &remaining[split_at..];
    }

    chunks
}
