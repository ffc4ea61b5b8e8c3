// ABOUTME: Application context and event loop for SmartHomeBot
// ABOUTME: Every handler receives the App explicitly; there is no global state

pub mod confirm;
pub mod handlers;
pub mod router;

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use futures_util::StreamExt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use smarthomebot_core::config::Config;
use smarthomebot_core::confirm::ConfirmationBook;
use smarthomebot_core::system::{Rebooter, SystemStats, VersionSource};
use smarthomebot_core::traits::{
    ChatId, EventStream, InboundEvent, MessageContent, MessagingPlatform, UserId,
};
use smarthomebot_core::SharedState;

use crate::scheduler::Scheduler;

/// Host collaborators the admin commands talk to
pub struct Collaborators {
    pub stats: Arc<dyn SystemStats>,
    /// None when no release repository is configured
    pub versions: Option<Arc<dyn VersionSource>>,
    pub rebooter: Arc<dyn Rebooter>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub timezone: Tz,
    pub reboot_delay_secs: u64,
    /// Running version reported by /version
    pub version: String,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timezone: config.timezone(),
            reboot_delay_secs: config.system.reboot_delay_secs,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub struct App {
    pub state: SharedState,
    pub platform: Arc<dyn MessagingPlatform>,
    pub scheduler: Scheduler,
    pub collaborators: Collaborators,
    pub settings: Settings,
    confirmations: Mutex<ConfirmationBook>,
}

impl App {
    pub fn new(
        state: SharedState,
        platform: Arc<dyn MessagingPlatform>,
        collaborators: Collaborators,
        settings: Settings,
    ) -> Self {
        let scheduler = Scheduler::new(state.clone(), Arc::clone(&platform));
        Self {
            state,
            platform,
            scheduler,
            collaborators,
            settings,
            confirmations: Mutex::new(ConfirmationBook::new()),
        }
    }

    /// Lock the confirmation book. Never held across an await.
    pub fn confirmations(&self) -> Result<MutexGuard<'_, ConfirmationBook>> {
        self.confirmations
            .lock()
            .map_err(|_| anyhow!("Confirmation book lock poisoned"))
    }

    pub async fn reply(&self, chat_id: ChatId, text: impl Into<String>) -> Result<()> {
        self.platform
            .send(chat_id, MessageContent::plain(text))
            .await
    }

    /// "Name (id)" when the transport knows the user, else the bare id
    pub async fn user_label(&self, user: UserId) -> String {
        match self.platform.display_name(user).await {
            Some(name) => format!("{} ({})", name, user),
            None => user.to_string(),
        }
    }

    /// Process one inbound event
    pub async fn handle_event(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::Message(msg) => router::handle_message(self, msg).await,
            InboundEvent::Callback(cb) => confirm::handle_callback(self, cb).await,
        }
    }

    /// Handle events one at a time until the stream ends or `shutdown` resolves
    pub async fn run(&self, mut events: EventStream, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                maybe_event = events.next() => {
                    let Some(event) = maybe_event else {
                        tracing::info!("Event stream closed");
                        break;
                    };
                    if let Err(e) = self.handle_event(event).await {
                        tracing::error!(error = %e, "Failed to handle event");
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }
        self.scheduler.shutdown();
    }
}
