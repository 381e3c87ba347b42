use serde::{Deserialize, Serialize};

/// Thompson Sampling arm for one topic cluster.
///
/// `alpha` and `beta` parameterize a Beta distribution; both start at 1.0
/// (uniform prior) and only ever increase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterArm {
    pub cluster_id: i64,
    pub alpha: f64,
    pub beta: f64,
    pub article_count: i64,
    pub label: String,
    pub updated_at: String,
}

impl ClusterArm {
    pub fn fresh(cluster_id: i64) -> Self {
        Self {
            cluster_id,
            alpha: 1.0,
            beta: 1.0,
            article_count: 0,
            label: String::new(),
            updated_at: String::new(),
        }
    }
}

/// User action kinds the bandit understands. Anything else is rejected at
/// the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Bookmark,
    Skip,
}

impl ActionKind {
    /// Whether the action counts as a bandit success (alpha increment).
    pub fn is_success(self) -> bool {
        matches!(self, Self::Click | Self::Bookmark)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Bookmark => "bookmark",
            Self::Skip => "skip",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "click" => Some(Self::Click),
            "bookmark" => Some(Self::Bookmark),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

/// One row of the user action log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: i64,
    pub article_id: String,
    pub action: String,
    pub cluster_id: Option<i64>,
    pub created_at: String,
}

/// Per-plugin collection state persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceState {
    pub plugin_name: String,
    pub last_fetched_at: Option<chrono::DateTime<chrono::Utc>>,
    pub fetch_status: String,
    pub error_message: Option<String>,
}

/// Article as it appears in a generated feed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub vendor: String,
    pub is_primary_source: bool,
    pub cluster_id: i64,
    pub published_at: String,
    pub collected_at: String,
    pub source_plugin: String,
}

/// Overview of one topic cluster for the topology endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub cluster_id: i64,
    pub article_count: usize,
    pub density: f64,
    pub label: String,
    pub alpha: f64,
    pub beta: f64,
    pub sample_titles: Vec<String>,
}

/// A technology adjacent to the user's declared stack, surfaced by the
/// co-occurrence analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingTechnology {
    pub name: String,
    pub count: usize,
    pub related_to: Vec<String>,
    pub sample_article_ids: Vec<String>,
}
