//! Builtin source plugins for the fixed vendor set.

mod anthropic_changelog;
mod aws_whatsnew;
mod gcp_release_notes;
mod github_platform;
mod github_releases;
mod openai_blog;

pub use anthropic_changelog::AnthropicChangelogPlugin;
pub use aws_whatsnew::AwsWhatsNewPlugin;
pub use gcp_release_notes::GcpReleaseNotesPlugin;
pub use github_platform::GitHubPlatformPlugin;
pub use github_releases::GitHubReleasesPlugin;
pub use openai_blog::OpenAiBlogPlugin;
