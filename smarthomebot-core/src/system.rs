// ABOUTME: Host-facing collaborator traits (system stats, release lookup, reboot)
// ABOUTME: Also holds the semver comparison used by /version

use anyhow::Result;
use async_trait::async_trait;

/// One reading of host load
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemSnapshot {
    /// Not every platform exposes a CPU sensor
    pub cpu_temperature: Option<f32>,
    pub cpu_load: f32,
    pub ram_load: f32,
}

impl SystemSnapshot {
    pub fn render(&self) -> String {
        let temperature = match self.cpu_temperature {
            Some(t) => format!("{:.1} °C", t),
            None => "unavailable".to_string(),
        };
        format!(
            "CPU temperature: {}\nCPU load: {:.1}%\nRAM load: {:.1}%",
            temperature, self.cpu_load, self.ram_load
        )
    }
}

#[async_trait]
pub trait SystemStats: Send + Sync {
    async fn snapshot(&self) -> Result<SystemSnapshot>;
}

#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Tag of the most recent published release
    async fn latest_version(&self) -> Result<String>;
}

#[async_trait]
pub trait Rebooter: Send + Sync {
    async fn reboot(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionStatus {
    UpToDate,
    UpdateAvailable { latest: String },
    /// Running build is newer than the latest release
    Ahead { latest: String },
    /// At least one side is not semver and the strings differ
    Differs { latest: String },
}

impl VersionStatus {
    pub fn render(&self, running: &str) -> String {
        match self {
            Self::UpToDate => format!("SmartHomeBot {} is up to date.", running),
            Self::UpdateAvailable { latest } => format!(
                "SmartHomeBot {} is running; version {} is available.",
                running, latest
            ),
            Self::Ahead { latest } => format!(
                "SmartHomeBot {} is running, newer than the latest release {}.",
                running, latest
            ),
            Self::Differs { latest } => format!(
                "SmartHomeBot {} is running; the latest release is {}.",
                running, latest
            ),
        }
    }
}

fn normalize_tag(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag)
}

/// Compare the running version against a release tag
pub fn compare_versions(running: &str, latest_tag: &str) -> VersionStatus {
    let current = normalize_tag(running);
    let latest = normalize_tag(latest_tag);
    match (semver::Version::parse(current), semver::Version::parse(latest)) {
        (Ok(current), Ok(latest_parsed)) => {
            if latest_parsed > current {
                VersionStatus::UpdateAvailable {
                    latest: latest.to_string(),
                }
            } else if latest_parsed < current {
                VersionStatus::Ahead {
                    latest: latest.to_string(),
                }
            } else {
                VersionStatus::UpToDate
            }
        }
        _ if current == latest => VersionStatus::UpToDate,
        _ => VersionStatus::Differs {
            latest: latest.to_string(),
        },
    }
}
