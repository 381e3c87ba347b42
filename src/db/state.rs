use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{ActionKind, ActionLogEntry, ClusterArm, SourceState};

/// Errors from the relational state store.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state database error: {0}")]
    Database(#[from] rusqlite::Error),
}

const STATE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS cluster_arms (
        cluster_id INTEGER PRIMARY KEY,
        alpha REAL DEFAULT 1.0,
        beta REAL DEFAULT 1.0,
        article_count INTEGER DEFAULT 0,
        label TEXT DEFAULT '',
        updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS action_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id TEXT NOT NULL,
        action TEXT NOT NULL,
        cluster_id INTEGER,
        created_at TEXT DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS sources (
        plugin_name TEXT PRIMARY KEY,
        last_fetched_at TEXT,
        fetch_status TEXT DEFAULT '',
        error_message TEXT
    );
"#;

/// Store for Thompson Sampling arms, the action log, and per-plugin
/// collection state. All access goes through one connection behind a mutex;
/// each write is a single statement, so concurrent increments commute.
pub struct StateStore {
    db: Arc<Mutex<Connection>>,
}

impl StateStore {
    /// Open (or create) the state database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StateError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store for tests.
    #[doc(hidden)]
    pub fn open_in_memory() -> Result<Self, StateError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StateError> {
        conn.execute_batch(STATE_SCHEMA)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn get_arm(&self, cluster_id: i64) -> Result<Option<ClusterArm>, StateError> {
        let db = self.db.lock().unwrap();
        let arm = db
            .query_row(
                "SELECT cluster_id, alpha, beta, article_count, label, updated_at
                 FROM cluster_arms WHERE cluster_id = ?1",
                [cluster_id],
                row_to_arm,
            )
            .optional()?;
        Ok(arm)
    }

    pub fn all_arms(&self) -> Result<Vec<ClusterArm>, StateError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT cluster_id, alpha, beta, article_count, label, updated_at
             FROM cluster_arms ORDER BY cluster_id",
        )?;
        let arms = stmt
            .query_map([], row_to_arm)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(arms)
    }

    /// Insert or refresh an arm. New arms get the uniform (1,1) prior;
    /// existing arms keep their learned parameters and any non-empty label,
    /// with only `article_count` and `updated_at` refreshed.
    pub fn upsert_arm(
        &self,
        cluster_id: i64,
        article_count: i64,
        label: &str,
    ) -> Result<(), StateError> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO cluster_arms (cluster_id, alpha, beta, article_count, label, updated_at)
             VALUES (?1, 1.0, 1.0, ?2, ?3, ?4)
             ON CONFLICT(cluster_id) DO UPDATE SET
                 article_count = excluded.article_count,
                 label = CASE WHEN excluded.label != '' THEN excluded.label
                              ELSE cluster_arms.label END,
                 updated_at = excluded.updated_at",
            params![cluster_id, article_count, label, now],
        )?;
        Ok(())
    }

    /// Apply one action to an arm: success bumps alpha, failure bumps beta.
    pub fn update_arm_reward(&self, cluster_id: i64, success: bool) -> Result<(), StateError> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let sql = if success {
            "UPDATE cluster_arms SET alpha = alpha + 1, updated_at = ?1 WHERE cluster_id = ?2"
        } else {
            "UPDATE cluster_arms SET beta = beta + 1, updated_at = ?1 WHERE cluster_id = ?2"
        };
        db.execute(sql, params![now, cluster_id])?;
        Ok(())
    }

    /// Append an action log row. Called before the arm update so a crash in
    /// between leaves the arm under-counted, never over-counted.
    pub fn log_action(
        &self,
        article_id: &str,
        action: ActionKind,
        cluster_id: Option<i64>,
    ) -> Result<(), StateError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO action_logs (article_id, action, cluster_id) VALUES (?1, ?2, ?3)",
            params![article_id, action.as_str(), cluster_id],
        )?;
        Ok(())
    }

    pub fn recent_actions(&self, limit: usize) -> Result<Vec<ActionLogEntry>, StateError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, article_id, action, cluster_id, created_at
             FROM action_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(ActionLogEntry {
                    id: row.get(0)?,
                    article_id: row.get(1)?,
                    action: row.get(2)?,
                    cluster_id: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn action_count(&self) -> Result<i64, StateError> {
        let db = self.db.lock().unwrap();
        let count = db.query_row("SELECT COUNT(*) FROM action_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn source_state(&self, plugin_name: &str) -> Result<Option<SourceState>, StateError> {
        let db = self.db.lock().unwrap();
        let state = db
            .query_row(
                "SELECT plugin_name, last_fetched_at, fetch_status, error_message
                 FROM sources WHERE plugin_name = ?1",
                [plugin_name],
                row_to_source_state,
            )
            .optional()?;
        Ok(state)
    }

    /// Record a successful run: status healthy, error cleared, watermark set.
    pub fn mark_source_healthy(
        &self,
        plugin_name: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), StateError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO sources (plugin_name, last_fetched_at, fetch_status, error_message)
             VALUES (?1, ?2, 'healthy', NULL)
             ON CONFLICT(plugin_name) DO UPDATE SET
                 last_fetched_at = excluded.last_fetched_at,
                 fetch_status = 'healthy',
                 error_message = NULL",
            params![plugin_name, fetched_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Record a failed fetch; the watermark is left untouched so the next
    /// run retries the same window.
    pub fn mark_source_error(&self, plugin_name: &str, message: &str) -> Result<(), StateError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO sources (plugin_name, fetch_status, error_message)
             VALUES (?1, 'error', ?2)
             ON CONFLICT(plugin_name) DO UPDATE SET
                 fetch_status = 'error',
                 error_message = excluded.error_message",
            params![plugin_name, message],
        )?;
        Ok(())
    }
}

fn row_to_arm(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClusterArm> {
    Ok(ClusterArm {
        cluster_id: row.get(0)?,
        alpha: row.get(1)?,
        beta: row.get(2)?,
        article_count: row.get(3)?,
        label: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        updated_at: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

fn row_to_source_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<SourceState> {
    let last_fetched: Option<String> = row.get(1)?;
    Ok(SourceState {
        plugin_name: row.get(0)?,
        last_fetched_at: last_fetched
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        fetch_status: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        error_message: row.get(3)?,
    })
}
