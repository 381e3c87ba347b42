use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::{CliSummarizer, Summarizer};

/// Registry of summarization providers, probed in registration order.
///
/// Built once at startup and passed explicitly, like the plugin registry.
pub struct SummarizerRegistry {
    providers: Vec<Arc<dyn Summarizer>>,
}

impl SummarizerRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Registry with the builtin CLI providers.
    pub fn with_defaults(timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CliSummarizer::claude(timeout)));
        registry.register(Arc::new(CliSummarizer::copilot(timeout)));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn Summarizer>) {
        self.providers.push(provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Summarizer>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// First provider whose external tool is present.
    pub async fn first_available(&self) -> Option<Arc<dyn Summarizer>> {
        for provider in &self.providers {
            if provider.is_available().await {
                info!("Using summarizer provider: {}", provider.display_name());
                return Some(provider.clone());
            }
        }
        None
    }
}

impl Default for SummarizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
