// ABOUTME: Chat transport implementations for SmartHomeBot
// ABOUTME: Currently the teloxide-backed Telegram adapter

pub mod telegram;

pub use telegram::{TelegramChat, TelegramPlatform};
