use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::RawArticle;
use crate::plugins::{head_probe, http_client, rss, PluginError, PluginInfo, SourcePlugin, SourceType};

const GCP_RELEASE_NOTES_RSS_URL: &str = "https://cloud.google.com/feeds/gcp-release-notes.xml";

/// Google Cloud release notes via the official RSS feed.
pub struct GcpReleaseNotesPlugin {
    feed_url: String,
    client: reqwest::Client,
}

impl GcpReleaseNotesPlugin {
    pub fn new() -> Self {
        Self::with_feed_url(GCP_RELEASE_NOTES_RSS_URL)
    }

    pub fn with_feed_url(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            client: http_client(),
        }
    }
}

impl Default for GcpReleaseNotesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourcePlugin for GcpReleaseNotesPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "gcp-release-notes".to_string(),
            display_name: "GCP Release Notes".to_string(),
            vendor: "GCP".to_string(),
            description: "Fetches Google Cloud Platform release notes via RSS feed".to_string(),
            source_type: SourceType::Rss,
            version: "1.0.0".to_string(),
            supported_tech_stack: [
                "cloud-run",
                "gke",
                "compute-engine",
                "cloud-functions",
                "cloud-storage",
                "cloud-sql",
                "firestore",
                "bigtable",
                "spanner",
                "vertex-ai",
                "bigquery",
                "dataflow",
                "pub-sub",
                "cloud-cdn",
                "cloud-dns",
                "iam",
                "secret-manager",
                "cloud-kms",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawArticle>, PluginError> {
        rss::fetch_feed(
            &self.client,
            "gcp-release-notes",
            &self.feed_url,
            "GCP",
            &[],
            since,
        )
        .await
    }

    async fn health_check(&self) -> bool {
        head_probe(&self.client, &self.feed_url).await
    }
}
