// Application settings, resolved once at startup from the environment.
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment variable prefix shared by all settings.
const ENV_PREFIX: &str = "BRAINSTREAM_";

/// Runtime configuration for the whole service.
///
/// Constructed from `BRAINSTREAM_*` environment variables with sensible
/// defaults; passed explicitly to the subsystems that need it (no globals).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Host the HTTP API binds to.
    pub host: String,
    /// Port the HTTP API binds to.
    pub port: u16,
    /// Whether the background fetch scheduler runs in `serve` mode.
    pub scheduler_enabled: bool,
    /// Minutes between scheduled collection runs.
    pub fetch_interval_minutes: u64,
    /// Root directory for persisted state.
    pub data_dir: PathBuf,
    /// Minimum members for a cluster to survive the clustering pass.
    pub min_cluster_size: usize,
    /// Neighborhood size used for core-distance estimation.
    pub min_samples: usize,
    /// Wall-clock timeout for one summarizer subprocess invocation.
    pub summarizer_timeout_secs: u64,
    /// Feed page size when the caller does not specify one.
    pub feed_default_limit: usize,
    /// Feed positions reserved for boundary articles.
    pub serendipity_slots: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".brainstream");
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            scheduler_enabled: true,
            fetch_interval_minutes: 30,
            data_dir,
            min_cluster_size: 5,
            min_samples: 3,
            summarizer_timeout_secs: 120,
            feed_default_limit: 20,
            serendipity_slots: 2,
        }
    }
}

impl Settings {
    /// Build settings from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Some(host) = env_var("HOST") {
            settings.host = host;
        }
        if let Some(port) = env_var("PORT") {
            settings.port = port
                .parse()
                .with_context(|| format!("invalid {ENV_PREFIX}PORT: {port}"))?;
        }
        if let Some(flag) = env_var("SCHEDULER") {
            settings.scheduler_enabled = parse_bool(&flag);
        }
        if let Some(interval) = env_var("FETCH_INTERVAL") {
            settings.fetch_interval_minutes = interval
                .parse()
                .with_context(|| format!("invalid {ENV_PREFIX}FETCH_INTERVAL: {interval}"))?;
        }
        if let Some(dir) = env_var("DATA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }

        Ok(settings)
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir).with_context(|| {
                format!("could not create data directory {}", self.data_dir.display())
            })?;
            tracing::debug!("Created data directory: {}", self.data_dir.display());
        }
        Ok(())
    }

    /// Path of the SQLite file backing the vector store.
    pub fn vectors_db_path(&self) -> PathBuf {
        self.data_dir.join("vectors.db")
    }

    /// Path of the SQLite file holding arms, action logs and source state.
    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir.join("state.db")
    }

    /// Path of the user settings file. Opaque to the core; owned by the UI.
    pub fn config_json_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
