// ABOUTME: Host collaborators behind the core traits
// ABOUTME: sysinfo stats, GitHub release lookup and a process-backed reboot

pub mod reboot;
pub mod releases;
pub mod stats;

pub use reboot::CommandRebooter;
pub use releases::GithubReleases;
pub use stats::SysinfoStats;
