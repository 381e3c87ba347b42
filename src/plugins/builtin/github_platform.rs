use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::RawArticle;
use crate::plugins::{head_probe, http_client, rss, PluginError, PluginInfo, SourcePlugin, SourceType};

const GITHUB_BLOG_RSS_URL: &str = "https://github.blog/feed/";
const GITHUB_CHANGELOG_RSS_URL: &str = "https://github.blog/changelog/feed/";

/// GitHub platform updates from the official blog and changelog feeds.
pub struct GitHubPlatformPlugin {
    blog_url: String,
    changelog_url: String,
    client: reqwest::Client,
}

impl GitHubPlatformPlugin {
    pub fn new() -> Self {
        Self::with_feed_urls(GITHUB_BLOG_RSS_URL, GITHUB_CHANGELOG_RSS_URL)
    }

    pub fn with_feed_urls(
        blog_url: impl Into<String>,
        changelog_url: impl Into<String>,
    ) -> Self {
        Self {
            blog_url: blog_url.into(),
            changelog_url: changelog_url.into(),
            client: http_client(),
        }
    }
}

impl Default for GitHubPlatformPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourcePlugin for GitHubPlatformPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "github-platform".to_string(),
            display_name: "GitHub Platform Updates".to_string(),
            vendor: "GitHub".to_string(),
            description: "Fetches GitHub Blog and Changelog updates via RSS".to_string(),
            source_type: SourceType::Rss,
            version: "1.0.0".to_string(),
            supported_tech_stack: [
                "github",
                "github-actions",
                "github-copilot",
                "github-pages",
                "github-packages",
                "codespaces",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawArticle>, PluginError> {
        let mut articles = rss::fetch_feed(
            &self.client,
            "github-platform",
            &self.blog_url,
            "GitHub",
            &["github", "blog"],
            since,
        )
        .await?;

        let changelog = rss::fetch_feed(
            &self.client,
            "github-platform",
            &self.changelog_url,
            "GitHub",
            &["github", "changelog"],
            since,
        )
        .await?;

        articles.extend(changelog);
        Ok(articles)
    }

    async fn health_check(&self) -> bool {
        head_probe(&self.client, &self.blog_url).await
    }
}
