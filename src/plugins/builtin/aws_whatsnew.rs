use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::RawArticle;
use crate::plugins::{head_probe, http_client, rss, PluginError, PluginInfo, SourcePlugin, SourceType};

const AWS_WHATSNEW_RSS_URL: &str = "https://aws.amazon.com/about-aws/whats-new/recent/feed/";

/// AWS What's New announcements via the official RSS feed: service launches,
/// feature updates, regional expansions, pricing changes.
pub struct AwsWhatsNewPlugin {
    feed_url: String,
    client: reqwest::Client,
}

impl AwsWhatsNewPlugin {
    pub fn new() -> Self {
        Self::with_feed_url(AWS_WHATSNEW_RSS_URL)
    }

    /// Override the feed URL, for testing.
    pub fn with_feed_url(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            client: http_client(),
        }
    }
}

impl Default for AwsWhatsNewPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourcePlugin for AwsWhatsNewPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "aws-whatsnew".to_string(),
            display_name: "AWS What's New".to_string(),
            vendor: "AWS".to_string(),
            description: "Fetches AWS What's New announcements via RSS feed".to_string(),
            source_type: SourceType::Rss,
            version: "1.0.0".to_string(),
            supported_tech_stack: [
                "lambda",
                "ec2",
                "ecs",
                "eks",
                "fargate",
                "s3",
                "ebs",
                "efs",
                "rds",
                "dynamodb",
                "aurora",
                "redshift",
                "vpc",
                "cloudfront",
                "route53",
                "api-gateway",
                "sagemaker",
                "bedrock",
                "athena",
                "kinesis",
                "iam",
                "cognito",
                "kms",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawArticle>, PluginError> {
        rss::fetch_feed(
            &self.client,
            "aws-whatsnew",
            &self.feed_url,
            "AWS",
            &[],
            since,
        )
        .await
    }

    async fn health_check(&self) -> bool {
        head_probe(&self.client, &self.feed_url).await
    }
}
