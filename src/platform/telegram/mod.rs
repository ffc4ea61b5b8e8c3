// ABOUTME: Telegram platform implementation of MessagingPlatform
// ABOUTME: Long polling for messages and callback queries, inline keyboards and a display-name cache

pub mod channel;

pub use channel::TelegramChat;

use anyhow::{Context, Result};
use async_trait::async_trait;
use smarthomebot_core::traits::{
    ChatUser, EventStream, InboundEvent, IncomingCallback, IncomingMessage, MessageContent,
    MessagingPlatform, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, ChatKind, UpdateKind, User};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const PLATFORM_ID: &str = "telegram";
const POLL_TIMEOUT_SECS: u32 = 30;
const RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

type NameCache = Arc<Mutex<HashMap<UserId, String>>>;

/// Telegram platform implementation using teloxide with long polling
pub struct TelegramPlatform {
    bot: Bot,
    bot_user_id: UserId,
    bot_username: String,
    /// Names seen on inbound updates, used for listings
    names: NameCache,
    connected: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl TelegramPlatform {
    /// Create a new TelegramPlatform for `bot_token`.
    ///
    /// Resolves the bot's user ID via the `getMe` API call.
    pub async fn new(bot_token: &str) -> Result<Self> {
        let bot = Bot::new(bot_token);

        let me = bot.get_me().await.context("Failed to call Telegram getMe")?;
        let bot_user_id = me.id.0 as UserId;
        let bot_username = me.username().to_string();

        tracing::info!(
            bot_username = %bot_username,
            bot_id = bot_user_id,
            "Telegram bot authenticated"
        );

        Ok(Self {
            bot,
            bot_user_id,
            bot_username,
            names: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(true)),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    fn chat(&self, chat_id: i64) -> TelegramChat {
        TelegramChat::new(ChatId(chat_id), self.bot.clone())
    }
}

fn chat_user(from: &User) -> ChatUser {
    let mut name = from.first_name.clone();
    if let Some(last) = &from.last_name {
        name.push(' ');
        name.push_str(last);
    }
    ChatUser {
        id: from.id.0 as UserId,
        display_name: Some(name),
        username: from.username.clone(),
    }
}

fn remember(names: &NameCache, user: &ChatUser) {
    if let Ok(mut cache) = names.lock() {
        cache.insert(user.id, user.label());
    }
}

/// Translate one update into an inbound event, or None for updates the bot ignores
fn translate(update: &Update, bot_user_id: UserId) -> Option<InboundEvent> {
    match &update.kind {
        UpdateKind::Message(message) => {
            let body = message.text()?.to_string();
            let from = message.from.as_ref()?;
            let sender = chat_user(from);
            // Skip messages from the bot itself
            if sender.id == bot_user_id {
                return None;
            }
            Some(InboundEvent::Message(IncomingMessage {
                chat_id: message.chat.id.0,
                sender,
                body,
                is_direct: matches!(message.chat.kind, ChatKind::Private(_)),
                event_id: message.id.0.to_string(),
            }))
        }
        UpdateKind::CallbackQuery(query) => {
            let sender = chat_user(&query.from);
            let (chat_id, message_id) = match &query.message {
                Some(msg) => (msg.chat().id.0, Some(msg.id().0)),
                // Without the message we only know the presser; answer in private
                None => (sender.id, None),
            };
            Some(InboundEvent::Callback(IncomingCallback {
                chat_id,
                sender,
                callback_id: query.id.0.clone(),
                message_id,
                data: query.data.clone().unwrap_or_default(),
            }))
        }
        _ => None,
    }
}

#[async_trait]
impl MessagingPlatform for TelegramPlatform {
    async fn event_stream(&self) -> Result<EventStream> {
        let (tx, rx) = mpsc::channel(256);
        let bot = self.bot.clone();
        let bot_user_id = self.bot_user_id;
        let names = Arc::clone(&self.names);
        let connected = Arc::clone(&self.connected);
        let stopped = Arc::clone(&self.stopped);

        // Spawn long polling task
        tokio::spawn(async move {
            let mut offset: i32 = 0;

            while !stopped.load(Ordering::Relaxed) {
                let updates = match bot
                    .get_updates()
                    .offset(offset)
                    .timeout(POLL_TIMEOUT_SECS)
                    .await
                {
                    Ok(updates) => {
                        if !connected.swap(true, Ordering::Relaxed) {
                            tracing::info!(platform = PLATFORM_ID, "Reconnected");
                        }
                        updates
                    }
                    Err(e) => {
                        tracing::warn!(
                            platform = PLATFORM_ID,
                            error = %e,
                            "Long polling error, retrying in 5s"
                        );
                        connected.store(false, Ordering::Relaxed);
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                };

                for update in &updates {
                    offset = update.id.as_offset();

                    let Some(event) = translate(update, bot_user_id) else {
                        continue;
                    };
                    match &event {
                        InboundEvent::Message(msg) => remember(&names, &msg.sender),
                        InboundEvent::Callback(cb) => remember(&names, &cb.sender),
                    }

                    if tx.send(event).await.is_err() {
                        tracing::warn!(platform = PLATFORM_ID, "Event stream receiver dropped");
                        return;
                    }
                }
            }
            tracing::debug!(platform = PLATFORM_ID, "Long polling stopped");
        });

        let stream = ReceiverStream::new(rx);
        Ok(Box::pin(stream))
    }

    async fn send(&self, chat_id: i64, content: MessageContent) -> Result<()> {
        self.chat(chat_id).send(content).await
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let mut req = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(text) = text {
            req = req.text(text);
        }
        req.await.context("Failed to answer callback query")?;
        Ok(())
    }

    async fn edit_prompt(&self, chat_id: i64, message_id: i32, text: &str) -> Result<()> {
        self.chat(chat_id).edit_prompt(message_id, text).await
    }

    async fn display_name(&self, user: UserId) -> Option<String> {
        self.names.lock().ok()?.get(&user).cloned()
    }

    fn bot_user_id(&self) -> UserId {
        self.bot_user_id
    }

    fn bot_username(&self) -> Option<&str> {
        Some(&self.bot_username)
    }

    fn platform_id(&self) -> &'static str {
        PLATFORM_ID
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!(platform = PLATFORM_ID, "Shutting down Telegram platform");
        self.stopped.store(true, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telegram_platform_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TelegramPlatform>();
    }

    #[test]
    fn test_name_cache_remembers_label() {
        let names: NameCache = Arc::new(Mutex::new(HashMap::new()));
        let mut user = ChatUser::new(42);
        user.username = Some("ada".to_string());
        remember(&names, &user);
        assert_eq!(names.lock().unwrap().get(&42).map(String::as_str), Some("@ada"));
    }
}
