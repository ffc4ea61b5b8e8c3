// ABOUTME: sysinfo-backed CPU temperature, CPU load and RAM load readings

use anyhow::Result;
use async_trait::async_trait;
use sysinfo::{Components, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::sync::Mutex;

use smarthomebot_core::system::{SystemSnapshot, SystemStats};

/// Sensor labels that usually belong to the CPU package
const CPU_SENSOR_HINTS: [&str; 5] = ["cpu", "package", "coretemp", "k10temp", "soc"];

pub struct SysinfoStats {
    system: Mutex<System>,
}

impl SysinfoStats {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoStats {
    fn default() -> Self {
        Self::new()
    }
}

fn cpu_temperature() -> Option<f32> {
    let components = Components::new_with_refreshed_list();
    let readings: Vec<(String, f32)> = components
        .iter()
        .filter_map(|c| c.temperature().map(|t| (c.label().to_lowercase(), t)))
        .filter(|(_, t)| t.is_finite())
        .collect();
    readings
        .iter()
        .find(|(label, _)| CPU_SENSOR_HINTS.iter().any(|hint| label.contains(hint)))
        .or_else(|| readings.first())
        .map(|(_, t)| *t)
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0) as f32
}

#[async_trait]
impl SystemStats for SysinfoStats {
    async fn snapshot(&self) -> Result<SystemSnapshot> {
        let mut system = self.system.lock().await;

        // CPU usage is a delta between two refreshes
        system.refresh_cpu_usage();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_cpu_usage();
        system.refresh_memory();

        let snapshot = SystemSnapshot {
            cpu_temperature: cpu_temperature(),
            cpu_load: system.global_cpu_usage(),
            ram_load: percent(system.used_memory(), system.total_memory()),
        };
        tracing::debug!(?snapshot, "System snapshot taken");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(50, 200), 25.0);
    }

    #[tokio::test]
    async fn test_snapshot_values_in_range() {
        let stats = SysinfoStats::new();
        let snap = stats.snapshot().await.unwrap();
        assert!((0.0..=100.0).contains(&snap.ram_load));
        assert!(snap.cpu_load >= 0.0);
    }
}
