use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::RawArticle;
use crate::plugins::{head_probe, http_client, rss, PluginError, PluginInfo, SourcePlugin, SourceType};

// The changelog page blocks scrapers, so the blog feed is the source.
const OPENAI_BLOG_RSS_URL: &str = "https://openai.com/blog/rss.xml";

/// OpenAI platform and model updates via the blog RSS feed.
pub struct OpenAiBlogPlugin {
    feed_url: String,
    client: reqwest::Client,
}

impl OpenAiBlogPlugin {
    pub fn new() -> Self {
        Self::with_feed_url(OPENAI_BLOG_RSS_URL)
    }

    pub fn with_feed_url(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            client: http_client(),
        }
    }
}

impl Default for OpenAiBlogPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourcePlugin for OpenAiBlogPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "openai-blog".to_string(),
            display_name: "OpenAI Blog".to_string(),
            vendor: "OpenAI".to_string(),
            description: "Fetches OpenAI announcements via the blog RSS feed".to_string(),
            source_type: SourceType::Rss,
            version: "1.0.0".to_string(),
            supported_tech_stack: [
                "openai",
                "gpt-4",
                "dall-e",
                "whisper",
                "embeddings",
                "fine-tuning",
                "assistants",
                "chat-completions",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawArticle>, PluginError> {
        rss::fetch_feed(
            &self.client,
            "openai-blog",
            &self.feed_url,
            "OpenAI",
            &["openai", "blog"],
            since,
        )
        .await
    }

    async fn health_check(&self) -> bool {
        head_probe(&self.client, &self.feed_url).await
    }
}
