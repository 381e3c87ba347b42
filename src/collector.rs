//! Collection orchestration: fan out over plugins, deduplicate, summarize,
//! ingest, and trigger re-clustering.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::db::{StateError, StateStore};
use crate::models::{merge_tags, Article, RawArticle, NOISE_CLUSTER};
use crate::plugins::{PluginRegistry, SourcePlugin};
use crate::summarizer::{Summarizer, SummarizerRegistry};
use crate::topology::{TopologyEngine, TopologyError};

const FALLBACK_SUMMARY_LEN: usize = 300;

/// Result of one plugin's collection pass.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult {
    pub source_name: String,
    pub fetched: usize,
    pub new: usize,
    pub processed: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl CollectionResult {
    fn failed(source_name: &str, message: String) -> Self {
        Self {
            source_name: source_name.to_string(),
            fetched: 0,
            new: 0,
            processed: 0,
            errors: vec![message],
            duration_ms: 0,
        }
    }
}

/// Aggregate of a whole collection run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub total_fetched: usize,
    pub total_new: usize,
    pub total_processed: usize,
    pub sources: Vec<CollectionResult>,
    pub duration_ms: u64,
}

/// Errors that abort a run. Per-plugin fetch failures do not appear here;
/// they are isolated into the run summary.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("unknown source: {0}")]
    UnknownSource(String),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// Orchestrates collection runs end-to-end.
pub struct CollectorService {
    registry: Arc<PluginRegistry>,
    summarizers: Arc<SummarizerRegistry>,
    topology: Arc<TopologyEngine>,
    state: Arc<StateStore>,
    skip_summarizer: bool,
    // Exactly one collection run at a time, scheduled or manual.
    run_lock: tokio::sync::Mutex<()>,
}

impl CollectorService {
    pub fn new(
        registry: Arc<PluginRegistry>,
        summarizers: Arc<SummarizerRegistry>,
        topology: Arc<TopologyEngine>,
        state: Arc<StateStore>,
    ) -> Self {
        Self {
            registry,
            summarizers,
            topology,
            state,
            skip_summarizer: false,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Skip the summarizer entirely (CLI `--skip-llm`); items take the
    /// fallback path.
    pub fn with_skip_summarizer(mut self, skip: bool) -> Self {
        self.skip_summarizer = skip;
        self
    }

    /// Collect from every registered plugin. Per-plugin failures are
    /// isolated; a store failure aborts the run.
    pub async fn collect_all(&self) -> Result<CollectionSummary, CollectorError> {
        let _run = self.run_lock.lock().await;
        let start = Instant::now();

        let provider = self.resolve_provider().await;
        let mut sources = Vec::new();
        let mut total_fetched = 0;
        let mut total_new = 0;
        let mut total_processed = 0;

        for plugin in self.registry.all() {
            let result = self.collect_with_plugin(plugin.as_ref(), provider.as_ref()).await?;
            total_fetched += result.fetched;
            total_new += result.new;
            total_processed += result.processed;
            sources.push(result);
        }

        if total_new > 0 {
            self.topology.recluster()?;
        }

        Ok(CollectionSummary {
            total_fetched,
            total_new,
            total_processed,
            sources,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Collect from a single named plugin.
    pub async fn collect_from(&self, source_name: &str) -> Result<CollectionResult, CollectorError> {
        let plugin = self
            .registry
            .get(source_name)
            .ok_or_else(|| CollectorError::UnknownSource(source_name.to_string()))?;

        let _run = self.run_lock.lock().await;
        let provider = self.resolve_provider().await;
        let result = self.collect_with_plugin(plugin.as_ref(), provider.as_ref()).await?;

        if result.new > 0 {
            self.topology.recluster()?;
        }
        Ok(result)
    }

    async fn resolve_provider(&self) -> Option<Arc<dyn Summarizer>> {
        if self.skip_summarizer {
            return None;
        }
        let provider = self.summarizers.first_available().await;
        if provider.is_none() {
            info!("No summarizer available, applying fallback processing");
        }
        provider
    }

    async fn collect_with_plugin(
        &self,
        plugin: &dyn SourcePlugin,
        provider: Option<&Arc<dyn Summarizer>>,
    ) -> Result<CollectionResult, CollectorError> {
        let start = Instant::now();
        let plugin_name = plugin.info().name;
        info!("Collecting from {plugin_name}...");

        let since = self
            .state
            .source_state(&plugin_name)?
            .and_then(|s| s.last_fetched_at);

        let raw_articles = match plugin.fetch(since).await {
            Ok(articles) => articles,
            Err(e) => {
                error!("Fetch failed for {plugin_name}: {e}");
                self.state.mark_source_error(&plugin_name, &e.to_string())?;
                return Ok(CollectionResult::failed(&plugin_name, e.to_string()));
            }
        };
        info!("Fetched {} articles from {plugin_name}", raw_articles.len());

        // Dedup by external_id against the topology store. Title or URL
        // collisions under different ids are left alone.
        let ids: Vec<String> = raw_articles.iter().map(|a| a.external_id.clone()).collect();
        let existing = self.topology.existing_ids(&ids)?;
        let new_articles: Vec<&RawArticle> = raw_articles
            .iter()
            .filter(|a| !existing.contains(&a.external_id))
            .collect();
        info!("Found {} new articles", new_articles.len());

        // Summarizer calls are sequential; the external tool is expensive
        // and may throttle.
        let mut batch = Vec::with_capacity(new_articles.len());
        let mut processed = 0usize;
        for raw in &new_articles {
            let (article, summarized) = self.process_item(provider, raw).await;
            if summarized {
                processed += 1;
            }
            batch.push(article);
        }

        if !batch.is_empty() {
            self.topology.ingest(&batch)?;
            info!("Saved {} articles", batch.len());
        }

        self.state.mark_source_healthy(&plugin_name, Utc::now())?;

        Ok(CollectionResult {
            source_name: plugin_name,
            fetched: raw_articles.len(),
            new: new_articles.len(),
            processed,
            errors: Vec::new(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Summarize one item, falling back to degraded content on any
    /// summarizer failure. Returns the article and whether the summarizer
    /// succeeded.
    async fn process_item(
        &self,
        provider: Option<&Arc<dyn Summarizer>>,
        raw: &RawArticle,
    ) -> (Article, bool) {
        let analysis = match provider {
            Some(provider) => {
                match provider
                    .analyze(&raw.title, &raw.content, &raw.source_url, &raw.vendor)
                    .await
                {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!("Summarization failed for {}: {e}", raw.external_id);
                        None
                    }
                }
            }
            None => None,
        };

        let (summary, tags, is_primary_source, tech_domain, summarized) = match analysis {
            Some(payload) => (
                if payload.summary.is_empty() {
                    fallback_summary(&raw.title, &raw.content)
                } else {
                    payload.summary
                },
                merge_tags(&raw.categories, &payload.tags),
                payload.is_primary_source,
                payload.tech_domain,
                true,
            ),
            None => (
                fallback_summary(&raw.title, &raw.content),
                merge_tags(&raw.categories, &[]),
                false,
                String::new(),
                false,
            ),
        };

        let article = Article {
            external_id: raw.external_id.clone(),
            source_url: raw.source_url.clone(),
            title: raw.title.clone(),
            content: raw.content.clone(),
            summary,
            tags,
            vendor: raw.vendor.clone(),
            published_at: raw.published_at,
            is_primary_source,
            tech_domain,
            source_plugin: raw.metadata.get("source").cloned().unwrap_or_default(),
            collected_at: Utc::now(),
            cluster_id: NOISE_CLUSTER,
        };
        (article, summarized)
    }
}

/// Degraded summary used when the summarizer is absent or fails: markup
/// stripped, truncated near a sentence boundary, title as last resort.
pub fn fallback_summary(title: &str, content: &str) -> String {
    let stripped = Regex::new(r"<[^>]+>")
        .expect("tag pattern compiles")
        .replace_all(content, "");
    let clean = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if clean.is_empty() {
        return title.to_string();
    }
    if clean.len() <= FALLBACK_SUMMARY_LEN {
        return clean;
    }

    let cut_at = clean
        .char_indices()
        .take_while(|(i, _)| *i <= FALLBACK_SUMMARY_LEN)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    let cut = &clean[..cut_at];
    match cut.rfind('.') {
        Some(period) if period > 100 => cut[..=period].to_string(),
        _ => format!("{}...", cut.trim_end()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_strips_markup_and_truncates() {
        let content = format!(
            "<p>First sentence about a release.</p> {}",
            "More detail. ".repeat(50)
        );
        let summary = fallback_summary("Title", &content);
        assert!(!summary.contains('<'));
        assert!(summary.len() <= FALLBACK_SUMMARY_LEN + 4);
        assert!(summary.ends_with('.') || summary.ends_with("..."));
    }

    #[test]
    fn fallback_uses_title_for_empty_content() {
        assert_eq!(fallback_summary("Only Title", "  "), "Only Title");
        assert_eq!(fallback_summary("Only Title", "<br/>"), "Only Title");
    }

    #[test]
    fn short_content_passes_through() {
        assert_eq!(
            fallback_summary("T", "A short announcement."),
            "A short announcement."
        );
    }
}
