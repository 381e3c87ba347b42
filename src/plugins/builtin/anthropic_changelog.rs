use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::RawArticle;
use crate::plugins::scrape::ChangelogScraper;
use crate::plugins::{head_probe, http_client, PluginError, PluginInfo, SourcePlugin, SourceType};

const ANTHROPIC_CHANGELOG_URL: &str = "https://docs.anthropic.com/en/release-notes/overview";

/// Anthropic API release notes, scraped from the documentation site: model
/// updates, API changes, breaking changes and deprecations.
pub struct AnthropicChangelogPlugin {
    changelog_url: String,
    client: reqwest::Client,
    scraper: ChangelogScraper,
}

impl AnthropicChangelogPlugin {
    pub fn new() -> Self {
        Self::with_changelog_url(ANTHROPIC_CHANGELOG_URL)
    }

    pub fn with_changelog_url(changelog_url: impl Into<String>) -> Self {
        let changelog_url = changelog_url.into();
        Self {
            scraper: ChangelogScraper::new(
                "anthropic-changelog",
                "anthropic",
                "Anthropic",
                changelog_url.clone(),
                &["api", "changelog", "claude"],
            ),
            changelog_url,
            client: http_client(),
        }
    }
}

impl Default for AnthropicChangelogPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourcePlugin for AnthropicChangelogPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "anthropic-changelog".to_string(),
            display_name: "Anthropic API Changelog".to_string(),
            vendor: "Anthropic".to_string(),
            description: "Fetches Anthropic API release notes by scraping their documentation"
                .to_string(),
            source_type: SourceType::Scraping,
            version: "1.0.0".to_string(),
            supported_tech_stack: [
                "anthropic",
                "claude",
                "messages-api",
                "tool-use",
                "vision",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawArticle>, PluginError> {
        let html = self
            .client
            .get(&self.changelog_url)
            .send()
            .await
            .map_err(|e| PluginError::fetch("anthropic-changelog", format!("HTTP error: {e}")))?
            .error_for_status()
            .map_err(|e| PluginError::fetch("anthropic-changelog", format!("HTTP error: {e}")))?
            .text()
            .await
            .map_err(|e| PluginError::fetch("anthropic-changelog", format!("HTTP error: {e}")))?;

        Ok(self.scraper.parse(&html, since))
    }

    async fn health_check(&self) -> bool {
        head_probe(&self.client, &self.changelog_url).await
    }
}
