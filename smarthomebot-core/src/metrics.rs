// ABOUTME: Counter helpers for bot activity plus the optional Prometheus scrape endpoint
// ABOUTME: Recording is a no-op until a recorder is installed, so tests never need one

use anyhow::{Context, Result};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub const COMMANDS_TOTAL: &str = "smarthomebot_commands_total";
pub const CONFIRMATIONS_TOTAL: &str = "smarthomebot_confirmations_total";
pub const TIMERS_FIRED_TOTAL: &str = "smarthomebot_timers_fired_total";
pub const REJECTIONS_TOTAL: &str = "smarthomebot_rejections_total";

/// Start the Prometheus HTTP listener. Must be called from inside a tokio runtime.
pub fn install_prometheus(listen: &str) -> Result<()> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid metrics listen address: {}", listen))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    tracing::info!(listen = %addr, "Prometheus metrics endpoint started");
    Ok(())
}

pub fn record_command(command: &str) {
    counter!(COMMANDS_TOTAL, "command" => command.to_string()).increment(1);
}

/// `outcome` is one of applied, rejected, aborted, not_yours, expired, failed
pub fn record_confirmation(outcome: &'static str) {
    counter!(CONFIRMATIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_rejection(reason: &'static str) {
    counter!(REJECTIONS_TOTAL, "reason" => reason).increment(1);
}

pub fn record_timer_fired(kind: &str) {
    counter!(TIMERS_FIRED_TOTAL, "kind" => kind.to_string()).increment(1);
}
