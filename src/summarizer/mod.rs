//! LLM summarization layer: a subprocess wrapper around external CLI tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod cli_tool;
mod extract;
mod registry;

pub use cli_tool::CliSummarizer;
pub use extract::extract_json;
pub use registry::SummarizerRegistry;

/// Structured analysis of one article, as emitted by the external tool.
/// Missing keys decode to defaults rather than failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryPayload {
    /// 2-3 sentence summary of what the announcement means for engineers.
    #[serde(default)]
    pub summary: String,
    /// General category labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// True if the URL is an official vendor announcement.
    #[serde(default)]
    pub is_primary_source: bool,
    /// Single hyphenated keyword for the main technology area.
    #[serde(default)]
    pub tech_domain: String,
}

/// Errors from the summarizer wrapper. The wrapper never retries; the
/// collector's fallback path handles all of these.
#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    #[error("[{tool}] not found on PATH")]
    ToolMissing { tool: String },
    #[error("[{tool}] timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },
    #[error("[{tool}] exited with failure: {stderr}")]
    Execution { tool: String, stderr: String },
    #[error("[{tool}] output was not decodable: {message}")]
    Parse { tool: String, message: String },
    #[error("[{tool}] could not spawn: {message}")]
    Spawn { tool: String, message: String },
}

/// A summarization provider.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;
    fn display_name(&self) -> &str;

    /// Whether the provider's external tool is usable. May be cached for
    /// the lifetime of the wrapper instance.
    async fn is_available(&self) -> bool;

    /// Analyze one article: summarize, tag, detect primary source, classify
    /// the technology domain.
    async fn analyze(
        &self,
        title: &str,
        content: &str,
        url: &str,
        vendor: &str,
    ) -> Result<SummaryPayload, SummarizerError>;
}
