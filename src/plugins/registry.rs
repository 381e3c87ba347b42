use std::sync::Arc;

use super::{builtin, PluginInfo, SourcePlugin};

/// Registry of source plugins.
///
/// Built once at startup and passed by `Arc` to the subsystems that need it;
/// deliberately not a process-wide singleton. Iteration order is
/// registration order, so collection runs are deterministic.
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn SourcePlugin>>,
}

impl PluginRegistry {
    /// Empty registry, mostly for tests.
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Registry with all builtin plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::AwsWhatsNewPlugin::new()));
        registry.register(Arc::new(builtin::GcpReleaseNotesPlugin::new()));
        registry.register(Arc::new(builtin::OpenAiBlogPlugin::new()));
        registry.register(Arc::new(builtin::AnthropicChangelogPlugin::new()));
        registry.register(Arc::new(builtin::GitHubPlatformPlugin::new()));
        registry.register(Arc::new(builtin::GitHubReleasesPlugin::new()));
        registry
    }

    /// Register a plugin. A plugin with the same name replaces the earlier
    /// registration.
    pub fn register(&mut self, plugin: Arc<dyn SourcePlugin>) {
        let name = plugin.info().name;
        self.plugins.retain(|p| p.info().name != name);
        self.plugins.push(plugin);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourcePlugin>> {
        self.plugins.iter().find(|p| p.info().name == name).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn SourcePlugin>> {
        self.plugins.clone()
    }

    pub fn infos(&self) -> Vec<PluginInfo> {
        self.plugins.iter().map(|p| p.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
