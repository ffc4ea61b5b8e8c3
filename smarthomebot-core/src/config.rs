// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates the timezone and metrics address and provides defaults for every section
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "SMARTHOMEBOT_CONFIG_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub updates: UpdatesConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Falls back to BOT_DATA.bot_token in the state file when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
}

// Custom Debug impl to redact bot_token
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field(
                "bot_token",
                &self.bot_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> String {
    paths::state_file().to_string_lossy().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Timezone for alarms and /time (e.g., "Europe/Rome", "UTC")
    /// Uses IANA timezone names. Defaults to system local timezone.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

fn default_timezone() -> String {
    // Try to detect system timezone, fall back to UTC
    if let Ok(tz) = std::env::var("TZ") {
        if tz.parse::<chrono_tz::Tz>().is_ok() {
            return tz;
        }
    }
    #[cfg(unix)]
    {
        if let Ok(link) = std::fs::read_link("/etc/localtime") {
            if let Some(tz) = link.to_str() {
                // /usr/share/zoneinfo/Europe/Rome
                if let Some(pos) = tz.find("zoneinfo/") {
                    let detected = tz[pos + 9..].to_string();
                    if detected.parse::<chrono_tz::Tz>().is_ok() {
                        return detected;
                    }
                }
            }
        }
    }
    "UTC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Command line run on a confirmed /reboot
    #[serde(default = "default_reboot_command")]
    pub reboot_command: String,
    /// Used when /reboot is given no delay
    #[serde(default = "default_reboot_delay_secs")]
    pub reboot_delay_secs: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            reboot_command: default_reboot_command(),
            reboot_delay_secs: default_reboot_delay_secs(),
        }
    }
}

fn default_reboot_command() -> String {
    "sudo reboot".to_string()
}

fn default_reboot_delay_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesConfig {
    /// GitHub `owner/name`; empty disables /version lookups
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            repo: String::new(),
            api_base: default_api_base(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// e.g. "127.0.0.1:9100"; unset disables the Prometheus endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}

/// Expand tilde (~) to home directory in paths
fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs
                .home_dir()
                .join(stripped)
                .to_string_lossy()
                .to_string();
        }
        tracing::warn!(
            path = %path,
            "Failed to expand tilde in path: could not determine home directory"
        );
    }
    path.to_string()
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. explicit path (the --config flag)
    /// 2. SMARTHOMEBOT_CONFIG_PATH env var
    /// 3. ./config.toml
    /// 4. ~/.config/smarthomebot/config.toml
    fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Config file {} does not exist", path.display());
            }
            return Ok(Some(path.to_path_buf()));
        }

        if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Ok(Some(local_config));
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Ok(Some(xdg_config));
        }

        Ok(None)
    }

    /// Load configuration with environment variable overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file(explicit)? {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        if let Ok(val) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !val.trim().is_empty() {
                config.telegram.bot_token = Some(val);
            }
        }
        if let Ok(val) = std::env::var("STATE_PATH") {
            config.state.path = val;
        }
        if let Ok(val) = std::env::var("SCHEDULER_TIMEZONE") {
            config.scheduler.timezone = val;
        }
        if let Ok(val) = std::env::var("REBOOT_DELAY_SECS") {
            config.system.reboot_delay_secs = val.parse().with_context(|| {
                format!("REBOOT_DELAY_SECS must be a number of seconds, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("METRICS_LISTEN") {
            config.metrics.listen = Some(val).filter(|v| !v.trim().is_empty());
        }

        config.state.path = expand_tilde(&config.state.path);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.scheduler.timezone.parse::<chrono_tz::Tz>().is_err() {
            anyhow::bail!(
                "Invalid timezone '{}'. Use IANA timezone names like 'Europe/Rome', 'America/Chicago', 'UTC'",
                self.scheduler.timezone
            );
        }
        if self.system.reboot_command.split_whitespace().next().is_none() {
            anyhow::bail!("system.reboot_command must not be empty");
        }
        if let Some(listen) = &self.metrics.listen {
            listen
                .parse::<std::net::SocketAddr>()
                .with_context(|| format!("Invalid metrics.listen address: {}", listen))?;
        }
        if !self.updates.repo.is_empty() && !self.updates.repo.contains('/') {
            anyhow::bail!(
                "updates.repo must look like 'owner/name', got: {}",
                self.updates.repo
            );
        }
        Ok(())
    }

    /// Parsed scheduler timezone; falls back to UTC for an unvalidated config
    pub fn timezone(&self) -> chrono_tz::Tz {
        self.scheduler.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(&self.state.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialize_full() {
        let toml_str = r#"
            [telegram]
            bot_token = "123456:ABC-DEF"

            [state]
            path = "/var/lib/smarthomebot/state.json"

            [scheduler]
            timezone = "Europe/Rome"

            [system]
            reboot_command = "systemctl reboot"
            reboot_delay_secs = 30

            [updates]
            repo = "someone/smarthomebot"

            [metrics]
            listen = "127.0.0.1:9100"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123456:ABC-DEF"));
        assert_eq!(config.state.path, "/var/lib/smarthomebot/state.json");
        assert_eq!(config.timezone(), chrono_tz::Europe::Rome);
        assert_eq!(config.system.reboot_command, "systemctl reboot");
        assert_eq!(config.system.reboot_delay_secs, 30);
        assert_eq!(config.updates.repo, "someone/smarthomebot");
        assert_eq!(config.updates.api_base, "https://api.github.com");
        assert_eq!(config.metrics.listen.as_deref(), Some("127.0.0.1:9100"));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_defaults_from_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.telegram.bot_token.is_none());
        assert_eq!(config.system.reboot_command, "sudo reboot");
        assert_eq!(config.system.reboot_delay_secs, 10);
        assert!(config.updates.repo.is_empty());
        assert!(config.metrics.listen.is_none());
        assert!(config.state.path.ends_with("state.json"));
    }

    #[test]
    fn test_telegram_config_debug_redacts_token() {
        let config = TelegramConfig {
            bot_token: Some("secret-token".to_string()),
        };
        let debug_str = format!("{:?}", config);
        assert!(
            !debug_str.contains("secret-token"),
            "bot_token should be redacted in Debug output"
        );
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.scheduler.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("Invalid timezone"));

        let mut config = Config::default();
        config.scheduler.timezone = "UTC".to_string();
        config.metrics.listen = Some("localhost".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheduler.timezone = "UTC".to_string();
        config.updates.repo = "no-slash".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheduler.timezone = "UTC".to_string();
        config.system.reboot_command = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/tmp/state.json"), "/tmp/state.json");
        assert!(!expand_tilde("~/state.json").starts_with('~'));
    }
}
