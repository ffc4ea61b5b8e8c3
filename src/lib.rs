// ABOUTME: Root library module for SmartHomeBot
// ABOUTME: Bot application, Telegram transport, timer scheduler and host collaborators

pub mod bot;
pub mod platform;
pub mod scheduler;
pub mod system;

// Re-export platform-agnostic modules from smarthomebot-core
pub use smarthomebot_core::commands;
pub use smarthomebot_core::config;
pub use smarthomebot_core::confirm;
pub use smarthomebot_core::metrics;
pub use smarthomebot_core::paths;
pub use smarthomebot_core::registry;
pub use smarthomebot_core::state;
pub use smarthomebot_core::store;
pub use smarthomebot_core::timers;
pub use smarthomebot_core::traits;
pub use smarthomebot_core::utils;
