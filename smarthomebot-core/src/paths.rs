// ABOUTME: Standardized paths for config, state and logs
// ABOUTME: Uses ~/.config/smarthomebot for config and ~/.local/share/smarthomebot for data

use directories::BaseDirs;
use std::path::PathBuf;

const APP_DIR: &str = "smarthomebot";

fn home_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// ~/.config/smarthomebot/
pub fn config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_DIR)
}

/// ~/.config/smarthomebot/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// ~/.local/share/smarthomebot/
/// Falls back to ./data if home directory unavailable
pub fn data_dir() -> PathBuf {
    let home = home_dir();
    if home == PathBuf::from(".") {
        PathBuf::from("./data")
    } else {
        home.join(".local").join("share").join(APP_DIR)
    }
}

/// ~/.local/share/smarthomebot/logs/
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Default location of the persisted registry
pub fn state_file() -> PathBuf {
    data_dir().join("state.json")
}
