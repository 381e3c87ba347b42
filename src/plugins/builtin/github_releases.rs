use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::models::RawArticle;
use crate::plugins::{http_client, PluginError, PluginInfo, SourcePlugin, SourceType, PROBE_TIMEOUT};

const GITHUB_API_BASE: &str = "https://api.github.com";
const RELEASES_PER_REPO: usize = 10;

/// Popular developer tools and frameworks tracked by default.
const DEFAULT_REPOSITORIES: &[&str] = &[
    "langchain-ai/langchain",
    "openai/openai-python",
    "anthropics/anthropic-sdk-python",
    "hashicorp/terraform",
    "kubernetes/kubernetes",
    "docker/compose",
    "tiangolo/fastapi",
    "vercel/next.js",
    "vitejs/vite",
];

#[derive(Debug, Deserialize)]
struct Release {
    id: Option<u64>,
    tag_name: Option<String>,
    name: Option<String>,
    body: Option<String>,
    html_url: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

/// Open-source release tracking via the GitHub REST API.
///
/// Iterates a configured repository set and fetches the most recent releases
/// for each. Draft releases are skipped; pre-releases are flagged in the
/// content. Per-repository failures (missing repo, rate limit) are skipped
/// so one bad repo does not sink the whole source.
pub struct GitHubReleasesPlugin {
    repositories: Vec<String>,
    github_token: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl GitHubReleasesPlugin {
    pub fn new() -> Self {
        Self::with_repositories(
            DEFAULT_REPOSITORIES.iter().map(|r| r.to_string()).collect(),
            None,
        )
    }

    pub fn with_repositories(repositories: Vec<String>, github_token: Option<String>) -> Self {
        Self {
            repositories,
            github_token,
            api_base: GITHUB_API_BASE.to_string(),
            client: http_client(),
        }
    }

    /// Point the plugin at a different API base, for testing.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.github_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn fetch_repo_releases(
        &self,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Vec<RawArticle> {
        let url = format!("{}/repos/{}/releases", self.api_base, repo);
        let response = match self
            .request(&url)
            .query(&[("per_page", RELEASES_PER_REPO.to_string())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Release fetch failed for {repo}: {e}");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            debug!("Release fetch for {repo} returned {}", response.status());
            return Vec::new();
        }

        let releases: Vec<Release> = match response.json().await {
            Ok(releases) => releases,
            Err(e) => {
                debug!("Release decode failed for {repo}: {e}");
                return Vec::new();
            }
        };

        let repo_short = repo.rsplit('/').next().unwrap_or(repo);
        let mut articles = Vec::new();

        for release in releases {
            if release.draft {
                continue;
            }

            let published_at = release
                .published_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            if let (Some(since), Some(published)) = (since, published_at) {
                if published < since {
                    continue;
                }
            }

            let tag_name = release.tag_name.unwrap_or_default();
            let release_name = release
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| tag_name.clone());
            let title = format!("{repo_short} {release_name}");

            let mut content_parts = Vec::new();
            if release.prerelease {
                content_parts.push("[Pre-release]".to_string());
            }
            if let Some(body) = release.body.filter(|b| !b.is_empty()) {
                content_parts.push(body);
            }
            let mut content = if content_parts.is_empty() {
                format!("Release {tag_name}")
            } else {
                content_parts.join("\n\n")
            };
            if content.len() > 5000 {
                let cut = content
                    .char_indices()
                    .take_while(|(i, _)| *i <= 5000)
                    .last()
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                content.truncate(cut);
            }

            let release_ref = release
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| tag_name.clone());

            let mut article = RawArticle::new(
                format!("github-{repo}-{release_ref}"),
                release
                    .html_url
                    .unwrap_or_else(|| format!("https://github.com/{repo}/releases")),
            );
            article.title = title;
            article.content = content;
            article.published_at = published_at;
            article.vendor = "GitHub OSS".to_string();
            article.categories = repo_categories(repo);
            article
                .metadata
                .insert("source".to_string(), "github-releases".to_string());
            article
                .metadata
                .insert("repository".to_string(), repo.to_string());
            article.metadata.insert("tag_name".to_string(), tag_name);
            article
                .metadata
                .insert("prerelease".to_string(), release.prerelease.to_string());
            articles.push(article);
        }

        articles
    }
}

impl Default for GitHubReleasesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Category seeding by repository family.
fn repo_categories(repo: &str) -> Vec<String> {
    let mut categories = vec!["release".to_string(), "github".to_string()];
    let repo_lower = repo.to_lowercase();
    let extra: &[&str] = if repo_lower.contains("langchain") {
        &["ai", "llm"]
    } else if repo_lower.contains("openai") || repo_lower.contains("anthropic") {
        &["ai", "sdk"]
    } else if repo_lower.contains("terraform") {
        &["infrastructure", "iac"]
    } else if repo_lower.contains("kubernetes") || repo_lower.contains("docker") {
        &["containers", "infrastructure"]
    } else if repo_lower.contains("fastapi") {
        &["python", "api"]
    } else if repo_lower.contains("next") || repo_lower.contains("vite") {
        &["javascript", "frontend"]
    } else {
        &[]
    };
    categories.extend(extra.iter().map(|c| c.to_string()));
    categories
}

#[async_trait]
impl SourcePlugin for GitHubReleasesPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "github-releases".to_string(),
            display_name: "GitHub OSS Releases".to_string(),
            vendor: "GitHub OSS".to_string(),
            description: "Fetches releases from open source GitHub repositories via API"
                .to_string(),
            source_type: SourceType::Api,
            version: "1.0.0".to_string(),
            supported_tech_stack: [
                "langchain",
                "terraform",
                "kubernetes",
                "docker",
                "fastapi",
                "nextjs",
                "vite",
                "python",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawArticle>, PluginError> {
        if self.repositories.is_empty() {
            return Err(PluginError::Config {
                plugin: "github-releases".to_string(),
                message: "no repositories configured".to_string(),
            });
        }

        let mut all_articles = Vec::new();
        for repo in &self.repositories {
            let articles = self.fetch_repo_releases(repo, since).await;
            all_articles.extend(articles);
        }

        // Newest first across all repositories.
        all_articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(all_articles)
    }

    async fn health_check(&self) -> bool {
        match self
            .request(&format!("{}/rate_limit", self.api_base))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
