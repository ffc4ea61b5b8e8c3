// ABOUTME: Reboot by running a configured command line, e.g. "sudo reboot"

use anyhow::{Context, Result};
use async_trait::async_trait;

use smarthomebot_core::system::Rebooter;

#[derive(Debug, Clone)]
pub struct CommandRebooter {
    program: String,
    args: Vec<String>,
}

impl CommandRebooter {
    /// Split `command_line` on whitespace into program and arguments
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .context("Reboot command must not be empty")?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl Rebooter for CommandRebooter {
    async fn reboot(&self) -> Result<()> {
        tracing::warn!(program = %self.program, args = ?self.args, "Running reboot command");
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .status()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;
        if !status.success() {
            anyhow::bail!("{} exited with {}", self.program, status);
        }
        Ok(())
    }
}
