use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw article data fetched from a source, before summarization.
///
/// Exists only for the duration of one collection run. `(plugin, external_id)`
/// uniquely identifies an item; `external_id` drives deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArticle {
    /// Stable identifier from the source.
    pub external_id: String,
    /// URL of the original announcement (required).
    pub source_url: String,
    /// Title as published by the source.
    pub title: String,
    /// Body or description; may contain markup.
    pub content: String,
    /// Publication instant, when the source provides one.
    pub published_at: Option<DateTime<Utc>>,
    /// Vendor name (e.g. "AWS", "GCP", "OpenAI").
    pub vendor: String,
    /// Categories/tags carried by the source entry.
    pub categories: Vec<String>,
    /// Additional source-specific metadata.
    pub metadata: HashMap<String, String>,
}

impl RawArticle {
    pub fn new(external_id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            source_url: source_url.into(),
            title: String::new(),
            content: String::new(),
            published_at: None,
            vendor: String::new(),
            categories: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

/// Cluster label for items the clustering pass did not assign.
pub const NOISE_CLUSTER: i64 = -1;

/// A processed, stored article: the raw fields plus summarization output
/// and the current cluster assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub external_id: String,
    pub source_url: String,
    pub title: String,
    pub content: String,
    /// 2-3 sentence summary; falls back to truncated content when the
    /// summarizer is unavailable.
    pub summary: String,
    /// Lowercased union of source categories and summarizer tags.
    pub tags: Vec<String>,
    pub vendor: String,
    pub published_at: Option<DateTime<Utc>>,
    /// True iff the URL host belongs to an official vendor domain, as judged
    /// by the summarizer.
    pub is_primary_source: bool,
    /// Single hyphenated keyword for the main technology area.
    pub tech_domain: String,
    /// Name of the plugin that collected this item.
    pub source_plugin: String,
    pub collected_at: DateTime<Utc>,
    /// Current cluster assignment; [`NOISE_CLUSTER`] until clustered.
    pub cluster_id: i64,
}

impl Article {
    /// Text the embedding is computed from.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }
}

/// Merge source categories and summarizer tags into the stored tag set:
/// lowercased, trimmed, deduplicated. Order is not significant.
pub fn merge_tags(categories: &[String], summarizer_tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    for tag in categories.iter().chain(summarizer_tags) {
        let normalized = tag.trim().to_lowercase();
        if !normalized.is_empty() {
            seen.insert(normalized);
        }
    }
    seen.into_iter().collect()
}
