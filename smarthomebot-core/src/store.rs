// ABOUTME: Persisted registry store - the single JSON state document and its atomic rewrite.
// ABOUTME: Sections BOT_DATA, USERS, CHATS and TIMERS are required; a missing one is CorruptState.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::registry::Roles;
use crate::timers::TimerBook;
use crate::traits::{ChatId, UserId};

const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Top-level sections every state file must carry
const REQUIRED_SECTIONS: [&str; 4] = ["BOT_DATA", "USERS", "CHATS", "TIMERS"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access state file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("State file {} is corrupt: missing section {section}", .path.display())]
    CorruptState { path: PathBuf, section: &'static str },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("State file {} already exists", .0.display())]
    AlreadyInitialized(PathBuf),
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotData {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub bot_id: UserId,
    #[serde(default)]
    pub bot_version: String,
}

// Custom Debug impl to redact bot_token
impl std::fmt::Debug for BotData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotData")
            .field("bot_token", &"[REDACTED]")
            .field("bot_id", &self.bot_id)
            .field("bot_version", &self.bot_version)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chats {
    #[serde(default)]
    pub allowed_chats: BTreeSet<ChatId>,
}

impl Chats {
    /// Group chats are filtered only when an allowlist is configured
    pub fn is_chat_allowed(&self, chat_id: ChatId) -> bool {
        self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id)
    }
}

/// Everything the bot persists, rewritten wholesale on each mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(rename = "BOT_DATA")]
    pub bot_data: BotData,
    #[serde(rename = "USERS")]
    pub users: Roles,
    #[serde(rename = "CHATS")]
    pub chats: Chats,
    #[serde(rename = "TIMERS")]
    pub timers: TimerBook,
}

impl RegistryState {
    pub fn new(
        owner: UserId,
        bot_token: impl Into<String>,
        bot_version: impl Into<String>,
    ) -> Self {
        Self {
            bot_data: BotData {
                bot_token: bot_token.into(),
                bot_id: 0,
                bot_version: bot_version.into(),
            },
            users: Roles::new(owner),
            chats: Chats::default(),
            timers: TimerBook::default(),
        }
    }
}

/// File-backed store for [`RegistryState`]
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Read and validate the state document
    pub fn load(&self) -> Result<RegistryState, StoreError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        for section in REQUIRED_SECTIONS {
            if value.get(section).map_or(true, |v| !v.is_object()) {
                return Err(StoreError::CorruptState {
                    path: self.path.clone(),
                    section,
                });
            }
        }

        serde_json::from_value(value).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Load with invariant repairs applied in memory only. The file is not rewritten.
    pub fn inspect(&self) -> Result<(RegistryState, Vec<&'static str>), StoreError> {
        let mut state = self.load()?;
        let repairs = state.users.normalize();
        Ok((state, repairs))
    }

    /// Serialize the full state and atomically replace the file (temp file + rename)
    pub fn save(&self, state: &RegistryState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let tmp = PathBuf::from(format!("{}{}", self.path.display(), TEMP_FILE_SUFFIX));
        std::fs::write(&tmp, bytes).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        tracing::debug!(path = %self.path.display(), "State file written");
        Ok(())
    }

    /// Create a fresh state file for `owner`. Refuses to overwrite an existing one.
    pub fn init(
        &self,
        owner: UserId,
        bot_token: &str,
        bot_version: &str,
    ) -> Result<RegistryState, StoreError> {
        if self.exists() {
            return Err(StoreError::AlreadyInitialized(self.path.clone()));
        }
        let state = RegistryState::new(owner, bot_token, bot_version);
        self.save(&state)?;
        tracing::info!(path = %self.path.display(), owner, "Initialized state file");
        Ok(state)
    }
}
