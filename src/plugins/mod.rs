//! Source plugin layer: one stateless adapter per external update source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RawArticle;

pub mod builtin;
pub mod registry;
pub mod rss;
pub mod scrape;

pub use registry::PluginRegistry;

/// Per-request timeout for plugin fetches.
pub(crate) const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for HEAD-style health probes.
pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const USER_AGENT: &str =
    "BrainStream/2.0 (+https://github.com/brainstream/brainstream)";

/// Mechanism a plugin uses to reach its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Rss,
    Api,
    Scraping,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Api => "api",
            Self::Scraping => "scraping",
        }
    }
}

/// Static metadata a plugin advertises about itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub display_name: String,
    pub vendor: String,
    pub description: String,
    pub source_type: SourceType,
    pub version: String,
    pub supported_tech_stack: Vec<String>,
}

/// Errors raised by source plugins. A plugin either returns a complete list
/// or raises; it never partially fails silently.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("[{plugin}] fetch failed: {message}")]
    Fetch { plugin: String, message: String },
    #[error("[{plugin}] invalid configuration: {message}")]
    Config { plugin: String, message: String },
}

impl PluginError {
    pub fn fetch(plugin: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }
}

/// A data source adapter. Plugins are stateless with respect to previous
/// runs; the `since` hint is advisory. Plugins never deduplicate, persist,
/// or call the summarizer.
#[async_trait]
pub trait SourcePlugin: Send + Sync {
    /// Static plugin metadata.
    fn info(&self) -> PluginInfo;

    /// Fetch updates, optionally filtered to items published after `since`.
    /// Items must carry stable `external_id`s.
    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawArticle>, PluginError>;

    /// Cheap reachability probe.
    async fn health_check(&self) -> bool;
}

/// Shared HTTP client with the fetch timeout and project user agent.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

/// HEAD probe used by plugin health checks.
pub(crate) async fn head_probe(client: &reqwest::Client, url: &str) -> bool {
    match client
        .head(url)
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}
