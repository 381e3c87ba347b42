//! Thompson-Sampling feed generation over topic clusters.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};
use tracing::{debug, info, warn};

use crate::db::{StateError, StateStore};
use crate::models::{ActionKind, Article, FeedItem, NOISE_CLUSTER};
use crate::topology::{TopologyEngine, TopologyError};

/// Feed tunables.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub default_limit: usize,
    /// Positions at the end of a page reserved for boundary articles.
    pub serendipity_slots: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            serendipity_slots: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// Generates feed pages and feeds user actions back into the cluster arms.
///
/// One Beta sample per arm per page; high-sample clusters fill the main
/// slots, and the reserved serendipity slots draw boundary articles from
/// low-sample clusters. Beta(1,1) priors mean maximum exploration until
/// actions arrive.
pub struct FeedSelector {
    topology: Arc<TopologyEngine>,
    state: Arc<StateStore>,
    config: FeedConfig,
    rng: parking_lot::Mutex<StdRng>,
}

impl FeedSelector {
    pub fn new(topology: Arc<TopologyEngine>, state: Arc<StateStore>, config: FeedConfig) -> Self {
        Self {
            topology,
            state,
            config,
            rng: parking_lot::Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic selector for tests: fixed seed, fixed arm state,
    /// fixed output.
    pub fn with_seed(
        topology: Arc<TopologyEngine>,
        state: Arc<StateStore>,
        config: FeedConfig,
        seed: u64,
    ) -> Self {
        Self {
            topology,
            state,
            config,
            rng: parking_lot::Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Generate one feed page.
    pub fn generate_feed(
        &self,
        limit: usize,
        vendor_filter: Option<&str>,
        primary_only: bool,
        offset: usize,
    ) -> Result<Vec<FeedItem>, FeedError> {
        let limit = if limit == 0 {
            self.config.default_limit
        } else {
            limit
        };

        let arms = self.state.all_arms()?;
        if arms.is_empty() {
            return self.latest_articles(limit, vendor_filter, primary_only, offset);
        }

        // One Thompson sample per arm.
        let mut sampled: Vec<(i64, f64)> = {
            let mut rng = self.rng.lock();
            arms.iter()
                .map(|arm| (arm.cluster_id, sample_beta(&mut rng, arm.alpha, arm.beta)))
                .collect()
        };
        sampled.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut serendipity_slots = self.config.serendipity_slots.min(limit);
        let main_slots = limit - serendipity_slots;
        let mut feed_items: Vec<FeedItem> = Vec::with_capacity(limit);

        // Fill main slots from high-sample clusters.
        let per_cluster = std::cmp::max(1, main_slots / std::cmp::max(sampled.len(), 1));
        let mut remaining_main = main_slots;

        for &(cluster_id, sampled_value) in &sampled {
            if remaining_main == 0 {
                break;
            }
            debug!("Cluster {cluster_id} sampled {sampled_value:.3}");

            let take = per_cluster.min(remaining_main);
            let articles = self
                .topology
                .cluster_articles(cluster_id, take + offset, true)?;
            for article in filter_articles(articles, vendor_filter, primary_only)
                .into_iter()
                .skip(offset)
                .take(take)
            {
                feed_items.push(to_feed_item(&article));
                remaining_main -= 1;
                if remaining_main == 0 {
                    break;
                }
            }
        }

        // Serendipity: boundary articles from the low-sample half.
        if serendipity_slots > 0 && sampled.len() > 1 {
            let low_count = std::cmp::max(3, sampled.len() / 2).min(sampled.len());
            let low_clusters = &sampled[sampled.len() - low_count..];
            let mut seen: HashSet<String> = feed_items.iter().map(|i| i.id.clone()).collect();

            'outer: for &(cluster_id, _) in low_clusters {
                let boundary = self.topology.boundary_articles(cluster_id, 3)?;
                let articles: Vec<Article> = boundary.into_iter().map(|(a, _)| a).collect();
                for article in filter_articles(articles, vendor_filter, primary_only) {
                    if seen.insert(article.external_id.clone()) {
                        feed_items.push(to_feed_item(&article));
                        serendipity_slots -= 1;
                        if serendipity_slots == 0 {
                            break 'outer;
                        }
                    }
                }
            }
        }

        feed_items.truncate(limit);
        Ok(feed_items)
    }

    /// Record a user action and update the matching arm. Unknown articles
    /// and noise items are ignored; the log row is written before the arm
    /// update.
    pub fn record_action(&self, article_id: &str, action: ActionKind) -> Result<(), FeedError> {
        let Some(article) = self.topology.get(article_id)? else {
            warn!("Article not found: {article_id}");
            return Ok(());
        };

        if article.cluster_id == NOISE_CLUSTER {
            debug!("Article {article_id} is noise (no cluster)");
            return Ok(());
        }

        self.state
            .log_action(article_id, action, Some(article.cluster_id))?;
        self.state
            .update_arm_reward(article.cluster_id, action.is_success())?;

        info!(
            "Recorded action '{}' for article {article_id} (cluster {}, {})",
            action.as_str(),
            article.cluster_id,
            if action.is_success() { "success" } else { "failure" },
        );
        Ok(())
    }

    /// Fallback when no arms exist yet: most recent articles globally.
    fn latest_articles(
        &self,
        limit: usize,
        vendor_filter: Option<&str>,
        primary_only: bool,
        offset: usize,
    ) -> Result<Vec<FeedItem>, FeedError> {
        let articles = self.topology.all_articles()?;
        Ok(filter_articles(articles, vendor_filter, primary_only)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|a| to_feed_item(&a))
            .collect())
    }
}

fn sample_beta(rng: &mut StdRng, alpha: f64, beta: f64) -> f64 {
    match Beta::new(alpha, beta) {
        Ok(distribution) => distribution.sample(rng),
        // Degenerate parameters should not happen (alpha, beta >= 1);
        // fall back to a uniform draw.
        Err(_) => rng.gen(),
    }
}

fn filter_articles(
    articles: Vec<Article>,
    vendor_filter: Option<&str>,
    primary_only: bool,
) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|a| {
            vendor_filter
                .map(|v| a.vendor.eq_ignore_ascii_case(v))
                .unwrap_or(true)
        })
        .filter(|a| !primary_only || a.is_primary_source)
        .collect()
}

fn to_feed_item(article: &Article) -> FeedItem {
    FeedItem {
        id: article.external_id.clone(),
        url: article.source_url.clone(),
        title: article.title.clone(),
        summary: article.summary.clone(),
        tags: article.tags.clone(),
        vendor: article.vendor.clone(),
        is_primary_source: article.is_primary_source,
        cluster_id: article.cluster_id,
        published_at: article
            .published_at
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default(),
        collected_at: article.collected_at.to_rfc3339(),
        source_plugin: article.source_plugin.clone(),
    }
}
