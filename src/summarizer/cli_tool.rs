use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{extract_json, Summarizer, SummarizerError, SummaryPayload};

const STDERR_TRUNCATE: usize = 400;
const CONTENT_TRUNCATE: usize = 3000;

/// Summarizer backed by an external CLI tool (`claude`, `copilot`, ...).
///
/// The tool receives the prompt as a `-p` argument and must emit the
/// analysis JSON on stdout. The PATH probe result is cached for the lifetime
/// of the wrapper instance.
pub struct CliSummarizer {
    name: String,
    display_name: String,
    command: String,
    timeout: Duration,
    resolved: OnceLock<Option<PathBuf>>,
}

impl CliSummarizer {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        command: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            command: command.into(),
            timeout,
            resolved: OnceLock::new(),
        }
    }

    /// The Claude Code CLI provider.
    pub fn claude(timeout: Duration) -> Self {
        Self::new("claude", "Claude Code", "claude", timeout)
    }

    /// The GitHub Copilot CLI provider.
    pub fn copilot(timeout: Duration) -> Self {
        Self::new("copilot", "GitHub Copilot", "copilot", timeout)
    }

    fn resolve_command(&self) -> Option<&PathBuf> {
        self.resolved
            .get_or_init(|| find_in_path(&self.command))
            .as_ref()
    }

    fn build_prompt(title: &str, content: &str, url: &str, vendor: &str) -> String {
        let content = truncate_chars(content, CONTENT_TRUNCATE);
        format!(
            r#"You are a technical intelligence analyst. Analyze this technology article and extract structured metadata.

Title: {title}
URL: {url}
Vendor: {vendor}

Content:
{content}

Respond in this exact JSON format:
{{
    "summary": "2-3 sentence summary of what this announcement means for engineers",
    "tags": ["category tags like compute, database, security, ai, devops, frontend, networking"],
    "is_primary_source": true or false (true if this URL is an official vendor announcement/blog/changelog, false if it's a third-party article about the vendor),
    "tech_domain": "primary technology domain (e.g., serverless, container-orchestration, machine-learning, database, security, networking, observability, ci-cd, frontend, iac)"
}}

Rules:
- is_primary_source should be true for URLs from official vendor domains (e.g., aws.amazon.com, cloud.google.com, openai.com, github.blog, docs.anthropic.com)
- tech_domain should be a single hyphenated keyword describing the main technology area
- tags should be 2-5 general category labels
- summary should be concise and actionable for engineers

Respond with ONLY the JSON, no other text."#
        )
    }

    async fn run_tool(&self, prompt: &str) -> Result<String, SummarizerError> {
        let Some(path) = self.resolve_command() else {
            return Err(SummarizerError::ToolMissing {
                tool: self.name.clone(),
            });
        };

        let mut child = tokio::process::Command::new(path)
            .arg("-p")
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SummarizerError::Spawn {
                tool: self.name.clone(),
                message: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| SummarizerError::Spawn {
                tool: self.name.clone(),
                message: e.to_string(),
            })?,
            Err(_) => {
                return Err(SummarizerError::Timeout {
                    tool: self.name.clone(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SummarizerError::Execution {
                tool: self.name.clone(),
                stderr: truncate_chars(stderr.trim(), STDERR_TRUNCATE),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Summarizer for CliSummarizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn is_available(&self) -> bool {
        self.resolve_command().is_some()
    }

    async fn analyze(
        &self,
        title: &str,
        content: &str,
        url: &str,
        vendor: &str,
    ) -> Result<SummaryPayload, SummarizerError> {
        let prompt = Self::build_prompt(title, content, url, vendor);
        let response = self.run_tool(&prompt).await?;
        debug!("{} returned {} bytes", self.name, response.len());

        let value = extract_json(&response).ok_or_else(|| SummarizerError::Parse {
            tool: self.name.clone(),
            message: format!(
                "could not extract JSON from response: {}",
                truncate_chars(&response, 200)
            ),
        })?;

        serde_json::from_value(value).map_err(|e| SummarizerError::Parse {
            tool: self.name.clone(),
            message: e.to_string(),
        })
    }
}

/// Look a command up on PATH, like `which`.
fn find_in_path(command: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(command);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .take_while(|(i, _)| *i <= max)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    text[..cut].to_string()
}
