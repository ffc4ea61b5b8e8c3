// ABOUTME: Latest release lookup against the GitHub releases API
// ABOUTME: Only the tag_name field of /repos/{owner}/{name}/releases/latest is read

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use smarthomebot_core::system::VersionSource;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

pub struct GithubReleases {
    client: reqwest::Client,
    url: String,
}

impl GithubReleases {
    pub fn new(api_base: &str, repo: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            // GitHub rejects requests without a User-Agent
            .user_agent(concat!("smarthomebot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: release_url(api_base, repo),
        })
    }
}

fn release_url(api_base: &str, repo: &str) -> String {
    format!(
        "{}/repos/{}/releases/latest",
        api_base.trim_end_matches('/'),
        repo.trim_matches('/')
    )
}

#[async_trait]
impl VersionSource for GithubReleases {
    async fn latest_version(&self) -> Result<String> {
        let resp = self
            .client
            .get(&self.url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Release lookup failed ({}): {}", status, text);
        }

        let release: Release = resp
            .json()
            .await
            .context("Failed to decode release response")?;
        tracing::debug!(tag = %release.tag_name, "Fetched latest release");
        Ok(release.tag_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_url() {
        assert_eq!(
            release_url("https://api.github.com/", "/owner/smarthomebot/"),
            "https://api.github.com/repos/owner/smarthomebot/releases/latest"
        );
    }

    #[test]
    fn test_release_decodes_tag_only() {
        let release: Release =
            serde_json::from_str(r#"{"tag_name": "v1.2.0", "name": "x", "draft": false}"#).unwrap();
        assert_eq!(release.tag_name, "v1.2.0");
    }
}
