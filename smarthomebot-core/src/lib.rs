// ABOUTME: Platform-agnostic core of SmartHomeBot: role registry, confirmations, timers and persistence
// ABOUTME: Provides the traits chat transports and host collaborators implement

pub mod commands;
pub mod config;
pub mod confirm;
pub mod metrics;
pub mod paths;
pub mod registry;
pub mod state;
pub mod store;
pub mod system;
pub mod timers;
pub mod traits;
pub mod utils;

pub use confirm::{ConfirmationBook, PendingAction, Resolution};
pub use registry::{Outcome, Rejection, RoleOp, Roles};
pub use state::SharedState;
pub use store::{RegistryState, StateStore, StoreError};
pub use system::{Rebooter, SystemSnapshot, SystemStats, VersionSource, VersionStatus};
pub use timers::{TimeError, TimerKind, TimerRecord};

// Re-export core traits for convenient access
pub use traits::{
    ChatId, ChatUser, EventStream, InboundEvent, IncomingCallback, IncomingMessage,
    MessageContent, MessagingPlatform, UserId,
};
