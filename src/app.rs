// Dependency container: every subsystem is constructed once here and
// passed down explicitly.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::api::ApiState;
use crate::collector::CollectorService;
use crate::config::Settings;
use crate::db::StateStore;
use crate::feed::{FeedConfig, FeedSelector};
use crate::plugins::PluginRegistry;
use crate::scheduler::Scheduler;
use crate::summarizer::SummarizerRegistry;
use crate::topology::{ClusterParams, SqliteVectorStore, TopologyEngine};

/// Application container holding all subsystems.
pub struct AppContext {
    pub settings: Settings,
    pub registry: Arc<PluginRegistry>,
    pub summarizers: Arc<SummarizerRegistry>,
    pub state: Arc<StateStore>,
    pub topology: Arc<TopologyEngine>,
    pub collector: Arc<CollectorService>,
    pub feed: Arc<FeedSelector>,
}

impl AppContext {
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_options(settings, false)
    }

    /// Build the container; `skip_summarizer` forces the fallback path
    /// (CLI `--skip-llm`).
    pub fn with_options(settings: Settings, skip_summarizer: bool) -> Result<Self> {
        settings.ensure_data_dir()?;

        let registry = Arc::new(PluginRegistry::with_builtins());
        let summarizers = Arc::new(SummarizerRegistry::with_defaults(Duration::from_secs(
            settings.summarizer_timeout_secs,
        )));

        let state = Arc::new(StateStore::open(&settings.state_db_path())?);
        let store = Arc::new(SqliteVectorStore::open(&settings.vectors_db_path())?);
        let topology = Arc::new(TopologyEngine::new(
            store,
            state.clone(),
            ClusterParams {
                min_cluster_size: settings.min_cluster_size,
                min_samples: settings.min_samples,
            },
        ));

        let collector = Arc::new(
            CollectorService::new(
                registry.clone(),
                summarizers.clone(),
                topology.clone(),
                state.clone(),
            )
            .with_skip_summarizer(skip_summarizer),
        );

        let feed = Arc::new(FeedSelector::new(
            topology.clone(),
            state.clone(),
            FeedConfig {
                default_limit: settings.feed_default_limit,
                serendipity_slots: settings.serendipity_slots,
            },
        ));

        Ok(Self {
            settings,
            registry,
            summarizers,
            state,
            topology,
            collector,
            feed,
        })
    }

    pub fn api_state(&self, scheduler: Arc<Scheduler>) -> ApiState {
        ApiState {
            feed: self.feed.clone(),
            topology: self.topology.clone(),
            registry: self.registry.clone(),
            collector: self.collector.clone(),
            scheduler,
        }
    }
}
