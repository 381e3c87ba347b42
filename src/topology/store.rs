//! Persistent vector storage.
//!
//! The engine only relies on the small capability set below (put, get,
//! scan, bulk cluster update), so any persistent, process-local store
//! qualifies. The default implementation keeps everything in a single
//! SQLite file with the vector as a JSON column.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::Article;

/// Errors from the vector store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("vector store database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("vector store record corrupt: {0}")]
    Corrupt(String),
}

/// One stored record: the article plus its embedding.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub article: Article,
    pub embedding: Vec<f32>,
}

/// Abstract persistent vector collection keyed by `external_id`.
pub trait VectorStore: Send + Sync {
    /// Store a batch atomically. Records whose id already exists are
    /// silently skipped. Returns the number actually stored.
    fn put_batch(&self, records: &[(Article, Vec<f32>)]) -> Result<usize, StoreError>;

    /// Fetch one article's metadata.
    fn get(&self, external_id: &str) -> Result<Option<Article>, StoreError>;

    /// Which of `ids` are already present.
    fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, StoreError>;

    /// Read every record with its embedding.
    fn bulk_scan(&self) -> Result<Vec<StoredRecord>, StoreError>;

    /// Rewrite cluster assignments in one transaction.
    fn update_cluster_ids(&self, assignments: &[(String, i64)]) -> Result<(), StoreError>;

    fn count(&self) -> Result<u64, StoreError>;
}

const VECTOR_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS articles (
        external_id TEXT PRIMARY KEY,
        source_url TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        summary TEXT NOT NULL DEFAULT '',
        tags TEXT NOT NULL DEFAULT '[]',
        vendor TEXT NOT NULL DEFAULT '',
        published_at TEXT,
        is_primary_source INTEGER NOT NULL DEFAULT 0,
        tech_domain TEXT NOT NULL DEFAULT '',
        source_plugin TEXT NOT NULL DEFAULT '',
        collected_at TEXT NOT NULL,
        cluster_id INTEGER NOT NULL DEFAULT -1,
        embedding TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_articles_cluster_id ON articles(cluster_id);
    CREATE INDEX IF NOT EXISTS idx_articles_vendor ON articles(vendor);
"#;

/// SQLite-backed [`VectorStore`]. Tags and the embedding are JSON columns.
pub struct SqliteVectorStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteVectorStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    #[doc(hidden)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(VECTOR_SCHEMA)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }
}

impl VectorStore for SqliteVectorStore {
    fn put_batch(&self, records: &[(Article, Vec<f32>)]) -> Result<usize, StoreError> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let mut stored = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO articles (
                     external_id, source_url, title, content, summary, tags,
                     vendor, published_at, is_primary_source, tech_domain,
                     source_plugin, collected_at, cluster_id, embedding
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;
            for (article, embedding) in records {
                let tags = serde_json::to_string(&article.tags)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                let vector = serde_json::to_string(embedding)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                stored += stmt.execute(params![
                    article.external_id,
                    article.source_url,
                    article.title,
                    article.content,
                    article.summary,
                    tags,
                    article.vendor,
                    article.published_at.map(|dt| dt.to_rfc3339()),
                    article.is_primary_source,
                    article.tech_domain,
                    article.source_plugin,
                    article.collected_at.to_rfc3339(),
                    article.cluster_id,
                    vector,
                ])?;
            }
        }
        tx.commit()?;
        Ok(stored)
    }

    fn get(&self, external_id: &str) -> Result<Option<Article>, StoreError> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE external_id = ?1"),
                [external_id],
                row_to_article,
            )
            .optional()?;
        Ok(row)
    }

    fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, StoreError> {
        let db = self.db.lock().unwrap();
        let mut found = HashSet::new();
        let mut stmt = db.prepare("SELECT 1 FROM articles WHERE external_id = ?1")?;
        for id in ids {
            if stmt.exists([id])? {
                found.insert(id.clone());
            }
        }
        Ok(found)
    }

    fn bulk_scan(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {ARTICLE_COLUMNS}, embedding FROM articles ORDER BY external_id"
        ))?;
        let rows = stmt.query_map([], |row| {
            let article = row_to_article(row)?;
            let vector_json: String = row.get(13)?;
            Ok((article, vector_json))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (article, vector_json) = row?;
            let embedding: Vec<f32> = serde_json::from_str(&vector_json)
                .map_err(|e| StoreError::Corrupt(format!("embedding decode: {e}")))?;
            records.push(StoredRecord { article, embedding });
        }
        Ok(records)
    }

    fn update_cluster_ids(&self, assignments: &[(String, i64)]) -> Result<(), StoreError> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        {
            let mut stmt =
                tx.prepare("UPDATE articles SET cluster_id = ?1 WHERE external_id = ?2")?;
            for (external_id, cluster_id) in assignments {
                stmt.execute(params![cluster_id, external_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count(&self) -> Result<u64, StoreError> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

const ARTICLE_COLUMNS: &str = "external_id, source_url, title, content, summary, tags, \
     vendor, published_at, is_primary_source, tech_domain, source_plugin, \
     collected_at, cluster_id";

fn row_to_article(row: &rusqlite::Row<'_>) -> rusqlite::Result<Article> {
    let tags_json: String = row.get(5)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    let published_at: Option<String> = row.get(7)?;
    let collected_at: String = row.get(11)?;

    Ok(Article {
        external_id: row.get(0)?,
        source_url: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        summary: row.get(4)?,
        tags,
        vendor: row.get(6)?,
        published_at: published_at
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        is_primary_source: row.get(8)?,
        tech_domain: row.get(9)?,
        source_plugin: row.get(10)?,
        collected_at: DateTime::parse_from_rfc3339(&collected_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        cluster_id: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_article(id: &str) -> Article {
        Article {
            external_id: id.to_string(),
            source_url: format!("https://example.com/{id}"),
            title: format!("Title {id}"),
            content: "Body".to_string(),
            summary: "Summary".to_string(),
            tags: vec!["compute".to_string()],
            vendor: "AWS".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            is_primary_source: true,
            tech_domain: "serverless".to_string(),
            source_plugin: "aws-whatsnew".to_string(),
            collected_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            cluster_id: -1,
        }
    }

    #[test]
    fn put_get_round_trip() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        let article = sample_article("a");
        let stored = store
            .put_batch(&[(article.clone(), vec![0.1, 0.2])])
            .unwrap();
        assert_eq!(stored, 1);

        let fetched = store.get("a").unwrap().unwrap();
        assert_eq!(fetched.external_id, article.external_id);
        assert_eq!(fetched.source_url, article.source_url);
        assert_eq!(fetched.title, article.title);
        assert_eq!(fetched.content, article.content);
        assert_eq!(fetched.vendor, article.vendor);
        assert_eq!(fetched.published_at, article.published_at);
        assert_eq!(fetched.tags, article.tags);
        assert_eq!(fetched.cluster_id, -1);
    }

    #[test]
    fn duplicate_ids_are_skipped() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        let article = sample_article("a");
        assert_eq!(
            store.put_batch(&[(article.clone(), vec![0.0])]).unwrap(),
            1
        );
        assert_eq!(store.put_batch(&[(article, vec![0.0])]).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn existing_ids_reports_only_present() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store
            .put_batch(&[(sample_article("a"), vec![0.0])])
            .unwrap();
        let found = store
            .existing_ids(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert!(found.contains("a"));
        assert!(!found.contains("b"));
    }

    #[test]
    fn bulk_scan_and_cluster_update() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store
            .put_batch(&[
                (sample_article("a"), vec![0.0, 1.0]),
                (sample_article("b"), vec![1.0, 0.0]),
            ])
            .unwrap();

        store
            .update_cluster_ids(&[("a".to_string(), 0), ("b".to_string(), 1)])
            .unwrap();

        let records = store.bulk_scan().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].article.external_id, "a");
        assert_eq!(records[0].article.cluster_id, 0);
        assert_eq!(records[0].embedding, vec![0.0, 1.0]);
        assert_eq!(records[1].article.cluster_id, 1);
    }
}
