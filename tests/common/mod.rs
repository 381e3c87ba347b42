#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use brainstream::collector::CollectorService;
use brainstream::db::StateStore;
use brainstream::feed::{FeedConfig, FeedSelector};
use brainstream::models::RawArticle;
use brainstream::plugins::{
    PluginError, PluginInfo, PluginRegistry, SourcePlugin, SourceType,
};
use brainstream::summarizer::{
    Summarizer, SummarizerError, SummarizerRegistry, SummaryPayload,
};
use brainstream::topology::{ClusterParams, SqliteVectorStore, TopologyEngine};

/// Everything a pipeline test needs, backed by a scratch data directory.
pub struct TestApp {
    pub dir: TempDir,
    pub state: Arc<StateStore>,
    pub topology: Arc<TopologyEngine>,
    pub registry: Arc<PluginRegistry>,
    pub collector: Arc<CollectorService>,
}

impl TestApp {
    pub fn new(registry: PluginRegistry, summarizers: SummarizerRegistry) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let state =
            Arc::new(StateStore::open(&dir.path().join("state.db")).expect("state store"));
        let store = Arc::new(
            SqliteVectorStore::open(&dir.path().join("vectors.db")).expect("vector store"),
        );
        let topology = Arc::new(TopologyEngine::new(
            store,
            state.clone(),
            ClusterParams::default(),
        ));
        let registry = Arc::new(registry);
        let collector = Arc::new(CollectorService::new(
            registry.clone(),
            Arc::new(summarizers),
            topology.clone(),
            state.clone(),
        ));
        Self {
            dir,
            state,
            topology,
            registry,
            collector,
        }
    }

    pub fn feed_selector(&self, seed: u64) -> FeedSelector {
        FeedSelector::with_seed(
            self.topology.clone(),
            self.state.clone(),
            FeedConfig::default(),
            seed,
        )
    }
}

/// A raw article published on the given day of January 2024.
pub fn raw_article(id: &str, title: &str, day: u32, categories: &[&str]) -> RawArticle {
    let mut article = RawArticle::new(id, format!("https://example.com/{id}"));
    article.title = title.to_string();
    article.content = format!("<p>{title} body text with enough detail to summarize.</p>");
    article.published_at = Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap());
    article.vendor = "Test".to_string();
    article.categories = categories.iter().map(|c| c.to_string()).collect();
    article.metadata = HashMap::from([("source".to_string(), "static".to_string())]);
    article
}

/// A plugin that returns a fixed article list. The `since` hint is honored
/// only when asked, mirroring sources that cannot filter server-side.
pub struct StaticPlugin {
    name: String,
    articles: Vec<RawArticle>,
    honor_since: bool,
}

impl StaticPlugin {
    pub fn new(name: &str, articles: Vec<RawArticle>) -> Self {
        Self {
            name: name.to_string(),
            articles,
            honor_since: false,
        }
    }

    pub fn honoring_since(mut self) -> Self {
        self.honor_since = true;
        self
    }
}

#[async_trait]
impl SourcePlugin for StaticPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: self.name.clone(),
            display_name: "Static Test Source".to_string(),
            vendor: "Test".to_string(),
            description: "Fixture plugin returning canned articles".to_string(),
            source_type: SourceType::Rss,
            version: "1.0.0".to_string(),
            supported_tech_stack: Vec::new(),
        }
    }

    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawArticle>, PluginError> {
        let mut articles = self.articles.clone();
        if self.honor_since {
            if let Some(since) = since {
                articles.retain(|a| a.published_at.map(|p| p >= since).unwrap_or(true));
            }
        }
        Ok(articles)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// A plugin whose fetch always fails.
pub struct FailingPlugin;

#[async_trait]
impl SourcePlugin for FailingPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "failing".to_string(),
            display_name: "Failing Test Source".to_string(),
            vendor: "Test".to_string(),
            description: "Fixture plugin that always fails".to_string(),
            source_type: SourceType::Api,
            version: "1.0.0".to_string(),
            supported_tech_stack: Vec::new(),
        }
    }

    async fn fetch(&self, _since: Option<DateTime<Utc>>) -> Result<Vec<RawArticle>, PluginError> {
        Err(PluginError::fetch("failing", "connection refused"))
    }

    async fn health_check(&self) -> bool {
        false
    }
}

/// A summarizer whose tool always times out.
pub struct TimeoutSummarizer;

#[async_trait]
impl Summarizer for TimeoutSummarizer {
    fn name(&self) -> &str {
        "timeout-test"
    }

    fn display_name(&self) -> &str {
        "Timeout Test Summarizer"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn analyze(
        &self,
        _title: &str,
        _content: &str,
        _url: &str,
        _vendor: &str,
    ) -> Result<SummaryPayload, SummarizerError> {
        Err(SummarizerError::Timeout {
            tool: "timeout-test".to_string(),
            seconds: 0,
        })
    }
}

/// A summarizer returning a fixed payload.
pub struct FixedSummarizer {
    pub payload: SummaryPayload,
}

#[async_trait]
impl Summarizer for FixedSummarizer {
    fn name(&self) -> &str {
        "fixed-test"
    }

    fn display_name(&self) -> &str {
        "Fixed Test Summarizer"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn analyze(
        &self,
        _title: &str,
        _content: &str,
        _url: &str,
        _vendor: &str,
    ) -> Result<SummaryPayload, SummarizerError> {
        Ok(self.payload.clone())
    }
}
