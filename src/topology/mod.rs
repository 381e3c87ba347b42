//! Topology engine: embeddings, persistent vector storage, clustering, and
//! spatial queries over the article collection.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use nalgebra::DVector;
use tracing::info;

use crate::db::{StateError, StateStore};
use crate::models::{Article, ClusterInfo, NOISE_CLUSTER};

pub mod clustering;
pub mod embedding;
pub mod store;

pub use clustering::ClusterParams;
pub use embedding::{Embedder, EMBEDDING_DIM};
pub use store::{SqliteVectorStore, StoreError, StoredRecord, VectorStore};

/// Errors from topology operations.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// Owns the vector store and cluster assignments; answers lookups by
/// cluster and by boundary distance.
pub struct TopologyEngine {
    store: Arc<dyn VectorStore>,
    state: Arc<StateStore>,
    embedder: Embedder,
    params: ClusterParams,
    // Embedding batches from different ingest calls must not interleave.
    ingest_guard: Mutex<()>,
}

impl TopologyEngine {
    pub fn new(store: Arc<dyn VectorStore>, state: Arc<StateStore>, params: ClusterParams) -> Self {
        Self {
            store,
            state,
            embedder: Embedder::new(),
            params,
            ingest_guard: Mutex::new(()),
        }
    }

    /// Embed and store articles whose ids are not already present.
    /// Returns the number of newly stored items.
    pub fn ingest(&self, articles: &[Article]) -> Result<usize, TopologyError> {
        let _guard = self.ingest_guard.lock().unwrap();

        if articles.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = articles.iter().map(|a| a.external_id.clone()).collect();
        let existing = self.store.existing_ids(&ids)?;

        let new_articles: Vec<&Article> = articles
            .iter()
            .filter(|a| !existing.contains(&a.external_id))
            .collect();
        if new_articles.is_empty() {
            info!("No new articles to embed");
            return Ok(0);
        }

        let texts: Vec<String> = new_articles.iter().map(|a| a.embedding_text()).collect();
        let embeddings = self.embedder.embed_batch(&texts);

        let records: Vec<(Article, Vec<f32>)> = new_articles
            .iter()
            .zip(embeddings)
            .map(|(article, embedding)| ((*article).clone(), embedding.as_slice().to_vec()))
            .collect();

        let stored = self.store.put_batch(&records)?;
        info!("Embedded and stored {stored} new articles");
        Ok(stored)
    }

    /// Re-run clustering over every stored embedding, write the assignments
    /// back, and sync cluster arms. Returns cluster id -> member count.
    pub fn recluster(&self) -> Result<BTreeMap<i64, usize>, TopologyError> {
        let records = self.store.bulk_scan()?;
        if records.is_empty() {
            info!("No articles to cluster");
            return Ok(BTreeMap::new());
        }

        let n = records.len();
        info!("Clustering {n} articles");

        let labels = if n < self.params.min_cluster_size {
            // Too few articles for density estimation: one catch-all cluster.
            info!("Too few articles for clustering, assigning all to cluster 0");
            vec![0i64; n]
        } else {
            let embeddings: Vec<DVector<f32>> = records
                .iter()
                .map(|r| DVector::from_vec(r.embedding.clone()))
                .collect();
            clustering::cluster_labels(&embeddings, &self.params)
        };

        let assignments: Vec<(String, i64)> = records
            .iter()
            .zip(&labels)
            .map(|(record, &label)| (record.article.external_id.clone(), label))
            .collect();
        self.store.update_cluster_ids(&assignments)?;

        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for &label in &labels {
            *counts.entry(label).or_insert(0) += 1;
        }

        for (&cluster_id, &count) in &counts {
            if cluster_id == NOISE_CLUSTER {
                continue;
            }
            self.state.upsert_arm(cluster_id, count as i64, "")?;
        }

        info!(
            "Clustering complete: {} clusters, {} noise articles",
            counts.keys().filter(|&&c| c != NOISE_CLUSTER).count(),
            counts.get(&NOISE_CLUSTER).copied().unwrap_or(0),
        );

        Ok(counts)
    }

    /// Up to `n` members of a cluster, newest first by default. Noise is
    /// never returned.
    pub fn cluster_articles(
        &self,
        cluster_id: i64,
        n: usize,
        newest_first: bool,
    ) -> Result<Vec<Article>, TopologyError> {
        if cluster_id == NOISE_CLUSTER {
            return Ok(Vec::new());
        }

        let mut members: Vec<Article> = self
            .store
            .bulk_scan()?
            .into_iter()
            .map(|r| r.article)
            .filter(|a| a.cluster_id == cluster_id)
            .collect();

        members.sort_by(compare_recency);
        if !newest_first {
            members.reverse();
        }
        members.truncate(n);
        Ok(members)
    }

    /// The `n` members farthest from the cluster centroid, descending by
    /// Euclidean distance. These are the serendipity candidates.
    pub fn boundary_articles(
        &self,
        cluster_id: i64,
        n: usize,
    ) -> Result<Vec<(Article, f32)>, TopologyError> {
        if cluster_id == NOISE_CLUSTER {
            return Ok(Vec::new());
        }

        let members: Vec<StoredRecord> = self
            .store
            .bulk_scan()?
            .into_iter()
            .filter(|r| r.article.cluster_id == cluster_id)
            .collect();
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let vectors: Vec<DVector<f32>> = members
            .iter()
            .map(|r| DVector::from_vec(r.embedding.clone()))
            .collect();
        let mut centroid = DVector::zeros(vectors[0].len());
        for vector in &vectors {
            centroid += vector;
        }
        centroid /= vectors.len() as f32;

        let mut ranked: Vec<(Article, f32)> = members
            .into_iter()
            .zip(&vectors)
            .map(|(record, vector)| {
                let distance = (vector - &centroid).norm();
                (record.article, distance)
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.external_id.cmp(&b.0.external_id))
        });
        ranked.truncate(n);
        Ok(ranked)
    }

    /// Fraction of total articles in each non-noise cluster.
    pub fn cluster_density(&self) -> Result<HashMap<i64, f64>, TopologyError> {
        let records = self.store.bulk_scan()?;
        let total = records.len();
        if total == 0 {
            return Ok(HashMap::new());
        }

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for record in &records {
            *counts.entry(record.article.cluster_id).or_insert(0) += 1;
        }

        Ok(counts
            .into_iter()
            .filter(|(cluster_id, _)| *cluster_id != NOISE_CLUSTER)
            .map(|(cluster_id, count)| (cluster_id, count as f64 / total as f64))
            .collect())
    }

    /// All stored articles, newest first (used when no clusters exist yet).
    pub fn all_articles(&self) -> Result<Vec<Article>, TopologyError> {
        let mut articles: Vec<Article> = self
            .store
            .bulk_scan()?
            .into_iter()
            .map(|r| r.article)
            .collect();
        articles.sort_by(compare_recency);
        Ok(articles)
    }

    pub fn get(&self, article_id: &str) -> Result<Option<Article>, TopologyError> {
        Ok(self.store.get(article_id)?)
    }

    /// Which of `ids` are already stored. Used by the collector's dedup.
    pub fn existing_ids(
        &self,
        ids: &[String],
    ) -> Result<std::collections::HashSet<String>, TopologyError> {
        Ok(self.store.existing_ids(ids)?)
    }

    pub fn total_count(&self) -> Result<u64, TopologyError> {
        Ok(self.store.count()?)
    }

    /// Overview of all non-noise clusters with their arm state.
    pub fn topology_info(&self) -> Result<Vec<ClusterInfo>, TopologyError> {
        let records = self.store.bulk_scan()?;
        let total = records.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let mut clusters: BTreeMap<i64, Vec<Article>> = BTreeMap::new();
        for record in records {
            if record.article.cluster_id == NOISE_CLUSTER {
                continue;
            }
            clusters
                .entry(record.article.cluster_id)
                .or_default()
                .push(record.article);
        }

        let arms: HashMap<i64, _> = self
            .state
            .all_arms()?
            .into_iter()
            .map(|arm| (arm.cluster_id, arm))
            .collect();

        let mut info = Vec::new();
        for (cluster_id, mut articles) in clusters {
            articles.sort_by(compare_recency);
            let sample_titles = articles
                .iter()
                .take(3)
                .map(|a| {
                    let mut title = a.title.clone();
                    if title.len() > 80 {
                        title.truncate(title.char_indices().take(80).last().map(|(i, _)| i).unwrap_or(0));
                    }
                    title
                })
                .collect();

            let arm = arms.get(&cluster_id);
            info.push(ClusterInfo {
                cluster_id,
                article_count: articles.len(),
                density: articles.len() as f64 / total as f64,
                label: arm.map(|a| a.label.clone()).unwrap_or_default(),
                alpha: arm.map(|a| a.alpha).unwrap_or(1.0),
                beta: arm.map(|a| a.beta).unwrap_or(1.0),
                sample_titles,
            });
        }

        Ok(info)
    }
}

/// Newest first by `published_at`; ties (and missing dates, which sort
/// last) break by `external_id` ascending for deterministic output.
pub(crate) fn compare_recency(a: &Article, b: &Article) -> Ordering {
    b.published_at
        .cmp(&a.published_at)
        .then_with(|| a.external_id.cmp(&b.external_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(id: &str, title: &str, cluster_id: i64, day: u32) -> Article {
        Article {
            external_id: id.to_string(),
            source_url: format!("https://example.com/{id}"),
            title: title.to_string(),
            content: String::new(),
            summary: title.to_string(),
            tags: vec![],
            vendor: "Test".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
            is_primary_source: false,
            tech_domain: String::new(),
            source_plugin: "test".to_string(),
            collected_at: Utc::now(),
            cluster_id,
        }
    }

    fn engine() -> TopologyEngine {
        let store = Arc::new(SqliteVectorStore::open_in_memory().unwrap());
        let state = Arc::new(StateStore::open_in_memory().unwrap());
        TopologyEngine::new(store, state, ClusterParams::default())
    }

    #[test]
    fn ingest_skips_duplicates() {
        let engine = engine();
        let articles = vec![
            article("a", "first", -1, 1),
            article("b", "second", -1, 2),
        ];
        assert_eq!(engine.ingest(&articles).unwrap(), 2);
        assert_eq!(engine.ingest(&articles).unwrap(), 0);
        assert_eq!(engine.total_count().unwrap(), 2);
    }

    #[test]
    fn small_corpus_collapses_to_cluster_zero() {
        let engine = engine();
        let articles = vec![
            article("a", "alpha news", -1, 1),
            article("b", "beta news", -1, 2),
            article("c", "gamma news", -1, 3),
        ];
        engine.ingest(&articles).unwrap();

        let counts = engine.recluster().unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&0], 3);

        let members = engine.cluster_articles(0, 10, true).unwrap();
        assert_eq!(members.len(), 3);
        // Newest first: c (Jan 3), b, a.
        let ids: Vec<&str> = members.iter().map(|a| a.external_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn recluster_syncs_arms() {
        let engine = engine();
        let articles: Vec<Article> = (0..3)
            .map(|i| article(&format!("a{i}"), "same topic", -1, i + 1))
            .collect();
        engine.ingest(&articles).unwrap();
        engine.recluster().unwrap();

        let arms = engine.state.all_arms().unwrap();
        assert_eq!(arms.len(), 1);
        assert_eq!(arms[0].cluster_id, 0);
        assert_eq!(arms[0].article_count, 3);
        assert_eq!(arms[0].alpha, 1.0);
        assert_eq!(arms[0].beta, 1.0);
    }

    #[test]
    fn two_topic_groups_separate() {
        let engine = engine();
        let mut articles = Vec::new();
        for i in 0..5 {
            articles.push(article(
                &format!("k{i}"),
                "kubernetes container orchestration update",
                -1,
                i + 1,
            ));
        }
        for i in 0..5 {
            articles.push(article(
                &format!("d{i}"),
                "database storage engine release",
                -1,
                i + 1,
            ));
        }
        engine.ingest(&articles).unwrap();
        let counts = engine.recluster().unwrap();

        let non_noise: Vec<i64> = counts
            .keys()
            .copied()
            .filter(|&c| c != NOISE_CLUSTER)
            .collect();
        assert_eq!(non_noise, vec![0, 1]);
        assert_eq!(counts[&0], 5);
        assert_eq!(counts[&1], 5);

        // Boundary queries rank members by centroid distance; identical
        // texts all sit on the centroid, so ties break by id.
        let boundary = engine.boundary_articles(0, 3).unwrap();
        assert_eq!(boundary.len(), 3);
        assert!(boundary[0].1 < 1e-4);
    }

    #[test]
    fn density_is_a_fraction_of_total() {
        let engine = engine();
        let articles: Vec<Article> = (0..4)
            .map(|i| article(&format!("a{i}"), "same topic", -1, i + 1))
            .collect();
        engine.ingest(&articles).unwrap();
        engine.recluster().unwrap();

        let density = engine.cluster_density().unwrap();
        assert_eq!(density.len(), 1);
        assert!((density[&0] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn noise_is_excluded_from_queries() {
        let engine = engine();
        assert!(engine.cluster_articles(-1, 10, true).unwrap().is_empty());
        assert!(engine.boundary_articles(-1, 3).unwrap().is_empty());
    }

    #[test]
    fn recency_tie_breaks_by_id() {
        let a = article("a", "x", 0, 1);
        let b = article("b", "y", 0, 1);
        assert_eq!(compare_recency(&a, &b), Ordering::Less);

        let mut c = article("c", "z", 0, 1);
        c.published_at = None;
        // Missing dates sort last.
        assert_eq!(compare_recency(&a, &c), Ordering::Less);
    }
}
