// ABOUTME: Shared fixtures for integration tests: a recording platform and scripted host collaborators
// ABOUTME: Harness builds an App over a temp state file with an owner, one admin and one user

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use smarthomebot::bot::{App, Collaborators, Settings};
use smarthomebot_core::system::{Rebooter, SystemSnapshot, SystemStats, VersionSource};
use smarthomebot_core::traits::{
    ChatId, ChatUser, EventStream, InboundEvent, IncomingCallback, IncomingMessage, MessageContent,
    MessagingPlatform, UserId,
};
use smarthomebot_core::{RegistryState, SharedState, StateStore};

pub const OWNER: UserId = 1;
pub const ADMIN: UserId = 2;
pub const USER: UserId = 3;
pub const STRANGER: UserId = 4;
pub const GROUP: ChatId = -100;

// =============================================================================
// Recording platform
// =============================================================================

#[derive(Default)]
pub struct MockPlatform {
    sent: Mutex<Vec<(ChatId, MessageContent)>>,
    answers: Mutex<Vec<(String, Option<String>)>>,
    edits: Mutex<Vec<(ChatId, i32, String)>>,
    names: Mutex<HashMap<UserId, String>>,
    failing_chats: Mutex<HashSet<ChatId>>,
    pub fail_edits: AtomicBool,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&self, user: UserId, name: &str) {
        self.names.lock().unwrap().insert(user, name.to_string());
    }

    /// Sends to `chat` fail from now on
    pub fn fail_sends_to(&self, chat: ChatId) {
        self.failing_chats.lock().unwrap().insert(chat);
    }

    pub fn sent(&self) -> Vec<(ChatId, MessageContent)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(c, _)| *c == chat)
            .map(|(_, content)| content.text().to_string())
            .collect()
    }

    pub fn last_text_to(&self, chat: ChatId) -> Option<String> {
        self.texts_to(chat).pop()
    }

    /// Payloads of the last confirmation prompt sent to `chat`
    pub fn last_prompt(&self, chat: ChatId) -> Option<(String, String, String)> {
        self.sent()
            .into_iter()
            .rev()
            .find_map(|(c, content)| match content {
                MessageContent::Confirm { text, yes, no } if c == chat => Some((text, yes, no)),
                _ => None,
            })
    }

    pub fn answers(&self) -> Vec<(String, Option<String>)> {
        self.answers.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<(ChatId, i32, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.answers.lock().unwrap().clear();
        self.edits.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessagingPlatform for MockPlatform {
    async fn event_stream(&self) -> Result<EventStream> {
        Ok(Box::pin(tokio_stream::empty()))
    }

    async fn send(&self, chat_id: ChatId, content: MessageContent) -> Result<()> {
        if self.failing_chats.lock().unwrap().contains(&chat_id) {
            anyhow::bail!("chat {} unreachable", chat_id);
        }
        self.sent.lock().unwrap().push((chat_id, content));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }

    async fn edit_prompt(&self, chat_id: ChatId, message_id: i32, text: &str) -> Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            anyhow::bail!("message {} can no longer be edited", message_id);
        }
        self.edits
            .lock()
            .unwrap()
            .push((chat_id, message_id, text.to_string()));
        Ok(())
    }

    async fn display_name(&self, user: UserId) -> Option<String> {
        self.names.lock().unwrap().get(&user).cloned()
    }

    fn bot_user_id(&self) -> UserId {
        999
    }

    fn bot_username(&self) -> Option<&str> {
        Some("SmartHomeBot")
    }

    fn platform_id(&self) -> &'static str {
        "mock"
    }
}

// =============================================================================
// Host collaborators
// =============================================================================

pub struct FixedStats;

#[async_trait]
impl SystemStats for FixedStats {
    async fn snapshot(&self) -> Result<SystemSnapshot> {
        Ok(SystemSnapshot {
            cpu_temperature: Some(48.5),
            cpu_load: 12.0,
            ram_load: 40.0,
        })
    }
}

pub struct FixedRelease(pub &'static str);

#[async_trait]
impl VersionSource for FixedRelease {
    async fn latest_version(&self) -> Result<String> {
        Ok(self.0.to_string())
    }
}

#[derive(Default)]
pub struct CountingRebooter {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl Rebooter for CountingRebooter {
    async fn reboot(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("permission denied");
        }
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub app: App,
    pub platform: Arc<MockPlatform>,
    pub rebooter: Arc<CountingRebooter>,
    pub dir: TempDir,
}

impl Harness {
    pub fn state_path(&self) -> std::path::PathBuf {
        self.dir.path().join("state.json")
    }

    /// Feed a message through the event handler
    pub async fn say(&self, msg: IncomingMessage) {
        self.app
            .handle_event(InboundEvent::Message(msg))
            .await
            .expect("Message handling failed");
    }

    /// Feed a button press through the event handler
    pub async fn tap(&self, cb: IncomingCallback) {
        self.app
            .handle_event(InboundEvent::Callback(cb))
            .await
            .expect("Callback handling failed");
    }

    /// State as persisted on disk
    pub fn on_disk(&self) -> RegistryState {
        StateStore::new(self.state_path()).load().unwrap()
    }
}

pub fn registry() -> RegistryState {
    let mut state = RegistryState::new(OWNER, "123:token", "0.1.0");
    state.users.admins.insert(ADMIN);
    state.users.allowed.insert(ADMIN);
    state.users.allowed.insert(USER);
    state
}

pub fn harness() -> Harness {
    harness_with(registry(), Some("0.2.0"))
}

pub fn harness_with(state: RegistryState, release: Option<&'static str>) -> Harness {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = StateStore::new(dir.path().join("state.json"));
    store.save(&state).expect("Failed to write state");

    let platform = Arc::new(MockPlatform::new());
    let rebooter = Arc::new(CountingRebooter::default());
    let collaborators = Collaborators {
        stats: Arc::new(FixedStats),
        versions: release.map(|tag| Arc::new(FixedRelease(tag)) as Arc<dyn VersionSource>),
        rebooter: rebooter.clone(),
    };
    let settings = Settings {
        timezone: chrono_tz::UTC,
        reboot_delay_secs: 10,
        version: "0.1.0".to_string(),
    };
    let app = App::new(
        SharedState::new(store, state),
        platform.clone(),
        collaborators,
        settings,
    );

    Harness {
        app,
        platform,
        rebooter,
        dir,
    }
}

/// Private message from `sender`
pub fn direct(sender: UserId, body: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id: sender,
        sender: ChatUser::new(sender),
        body: body.to_string(),
        is_direct: true,
        event_id: "1".to_string(),
    }
}

pub fn in_group(chat_id: ChatId, sender: UserId, body: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id,
        is_direct: false,
        ..direct(sender, body)
    }
}

pub fn press(
    chat_id: ChatId,
    sender: UserId,
    message_id: Option<i32>,
    data: &str,
) -> IncomingCallback {
    IncomingCallback {
        chat_id,
        sender: ChatUser::new(sender),
        callback_id: format!("cb-{}", sender),
        message_id,
        data: data.to_string(),
    }
}
