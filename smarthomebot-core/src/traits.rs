// ABOUTME: Core traits for the chat transport seam
// ABOUTME: MessagingPlatform plus the outbound content and inbound event types it carries

use anyhow::Result;
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// Numeric chat-member identifier (Telegram user id)
pub type UserId = i64;

/// Numeric chat identifier. For private chats it equals the user's id.
pub type ChatId = i64;

// =============================================================================
// Message Content Types
// =============================================================================

/// Content that can be sent to a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Plain text message
    Plain(String),
    /// Message with both plain text and HTML formatting
    Html { plain: String, html: String },
    /// Yes/no prompt rendered with two inline buttons carrying opaque payloads
    Confirm { text: String, yes: String, no: String },
}

impl MessageContent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(text.into())
    }

    pub fn html(plain: impl Into<String>, html: impl Into<String>) -> Self {
        Self::Html {
            plain: plain.into(),
            html: html.into(),
        }
    }

    pub fn confirm(
        text: impl Into<String>,
        yes: impl Into<String>,
        no: impl Into<String>,
    ) -> Self {
        Self::Confirm {
            text: text.into(),
            yes: yes.into(),
            no: no.into(),
        }
    }

    /// Plain-text rendering, used for logs and tests
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(text) => text,
            Self::Html { plain, .. } => plain,
            Self::Confirm { text, .. } => text,
        }
    }
}

// =============================================================================
// User Identity
// =============================================================================

/// Identity of a chat user as seen on an inbound event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatUser {
    pub id: UserId,
    /// First and last name joined, if the platform supplied them
    pub display_name: Option<String>,
    /// Handle without the leading @
    pub username: Option<String>,
}

impl ChatUser {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            display_name: None,
            username: None,
        }
    }

    pub fn with_name(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: Some(name.into()),
            username: None,
        }
    }

    /// Best human-readable label: display name, then @username, then the id
    pub fn label(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        if let Some(username) = &self.username {
            return format!("@{}", username);
        }
        self.id.to_string()
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// Incoming text message
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub sender: ChatUser,
    /// Message body (text content)
    pub body: String,
    /// Whether this is a private (1:1) conversation
    pub is_direct: bool,
    /// Platform-specific event ID
    pub event_id: String,
}

/// A button press on an inline keyboard
#[derive(Debug, Clone)]
pub struct IncomingCallback {
    pub chat_id: ChatId,
    /// The user who pressed the button
    pub sender: ChatUser,
    /// Platform callback id, needed to acknowledge the press
    pub callback_id: String,
    /// Message carrying the keyboard, when the platform still has it
    pub message_id: Option<i32>,
    /// Opaque payload attached to the pressed button
    pub data: String,
}

#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(IncomingMessage),
    Callback(IncomingCallback),
}

/// Boxed stream type for platform events
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

// =============================================================================
// Messaging Platform
// =============================================================================

/// Transport the bot runs on: delivers inbound events and accepts replies.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Receive inbound messages and button presses as a stream
    async fn event_stream(&self) -> Result<EventStream>;

    /// Send content to a chat
    async fn send(&self, chat_id: ChatId, content: MessageContent) -> Result<()>;

    /// Acknowledge a button press, optionally with a short toast text
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    /// Replace the text of a previously sent prompt and drop its keyboard
    async fn edit_prompt(&self, chat_id: ChatId, message_id: i32, text: &str) -> Result<()>;

    /// Look up a display name for a user id
    async fn display_name(&self, _user: UserId) -> Option<String> {
        None
    }

    /// Bot's own user ID on this platform
    fn bot_user_id(&self) -> UserId;

    /// Bot's username, used to strip `/command@botname` suffixes
    fn bot_username(&self) -> Option<&str> {
        None
    }

    /// Platform identifier (e.g., "telegram")
    fn platform_id(&self) -> &'static str;

    /// Gracefully shut down the platform connection
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
