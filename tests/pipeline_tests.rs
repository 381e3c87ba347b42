mod common;

use std::sync::Arc;

use brainstream::collector::CollectorError;
use brainstream::plugins::PluginRegistry;
use brainstream::summarizer::{SummarizerRegistry, SummaryPayload};

use common::{
    raw_article, FailingPlugin, FixedSummarizer, StaticPlugin, TestApp, TimeoutSummarizer,
};

fn three_articles() -> Vec<brainstream::models::RawArticle> {
    vec![
        raw_article("a", "alpha release", 1, &["compute"]),
        raw_article("b", "beta release", 2, &["storage"]),
        raw_article("c", "gamma release", 3, &["compute"]),
    ]
}

#[tokio::test]
async fn cold_start_rss_happy_path() {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(StaticPlugin::new("static", three_articles())));
    // No summarizer available: everything takes the fallback path.
    let app = TestApp::new(registry, SummarizerRegistry::new());

    let summary = app.collector.collect_all().await.unwrap();
    assert_eq!(summary.total_fetched, 3);
    assert_eq!(summary.total_new, 3);
    assert_eq!(summary.total_processed, 0);
    assert!(summary.sources.iter().all(|s| s.errors.is_empty()));

    // Below min_cluster_size: everything lands in cluster 0 with one arm.
    assert_eq!(app.topology.total_count().unwrap(), 3);
    let members = app.topology.cluster_articles(0, 10, true).unwrap();
    assert_eq!(members.len(), 3);
    let arms = app.state.all_arms().unwrap();
    assert_eq!(arms.len(), 1);
    assert_eq!(arms[0].article_count, 3);

    // Feed comes back newest first: c, b, a.
    let feed = app.feed_selector(1).generate_feed(10, None, false, 0).unwrap();
    let ids: Vec<&str> = feed.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
}

#[tokio::test]
async fn second_run_dedups_everything() {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(StaticPlugin::new("static", three_articles())));
    let app = TestApp::new(registry, SummarizerRegistry::new());

    app.collector.collect_all().await.unwrap();
    let second = app.collector.collect_all().await.unwrap();

    assert_eq!(second.total_fetched, 3);
    assert_eq!(second.total_new, 0);
    assert_eq!(app.topology.total_count().unwrap(), 3);
}

#[tokio::test]
async fn since_watermark_reaches_the_plugin() {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(
        StaticPlugin::new("static", three_articles()).honoring_since(),
    ));
    let app = TestApp::new(registry, SummarizerRegistry::new());

    let first = app.collector.collect_all().await.unwrap();
    assert_eq!(first.total_fetched, 3);

    let state = app.state.source_state("static").unwrap().unwrap();
    assert_eq!(state.fetch_status, "healthy");
    assert!(state.last_fetched_at.is_some());

    // The stored watermark is after every published date, so a plugin that
    // filters server-side returns nothing on the second run.
    let second = app.collector.collect_all().await.unwrap();
    assert_eq!(second.total_fetched, 0);
    assert_eq!(second.total_new, 0);
}

#[tokio::test]
async fn summarizer_timeout_falls_back() {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(StaticPlugin::new(
        "static",
        vec![raw_article(
            "x",
            "timeout case",
            5,
            &["API", "Changelog"],
        )],
    )));
    let mut summarizers = SummarizerRegistry::new();
    summarizers.register(Arc::new(TimeoutSummarizer));
    let app = TestApp::new(registry, summarizers);

    let summary = app.collector.collect_all().await.unwrap();
    assert_eq!(summary.total_new, 1);
    // The summarizer never succeeded.
    assert_eq!(summary.total_processed, 0);

    let article = app.topology.get("x").unwrap().unwrap();
    // Truncated-content fallback, with markup stripped.
    assert!(article.summary.contains("timeout case body text"));
    assert!(!article.summary.contains('<'));
    assert_eq!(article.tech_domain, "");
    assert!(!article.is_primary_source);
    // Tags are exactly the lowercased source categories.
    assert_eq!(article.tags, vec!["api", "changelog"]);
}

#[tokio::test]
async fn summarizer_output_enriches_articles() {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(StaticPlugin::new(
        "static",
        vec![raw_article("x", "enriched case", 5, &["Compute"])],
    )));
    let mut summarizers = SummarizerRegistry::new();
    summarizers.register(Arc::new(FixedSummarizer {
        payload: SummaryPayload {
            summary: "A concise engineered summary.".to_string(),
            tags: vec!["Serverless".to_string(), "compute".to_string()],
            is_primary_source: true,
            tech_domain: "serverless".to_string(),
        },
    }));
    let app = TestApp::new(registry, summarizers);

    let summary = app.collector.collect_all().await.unwrap();
    assert_eq!(summary.total_processed, 1);

    let article = app.topology.get("x").unwrap().unwrap();
    assert_eq!(article.summary, "A concise engineered summary.");
    assert!(article.is_primary_source);
    assert_eq!(article.tech_domain, "serverless");
    // Lowercased union of categories and summarizer tags, deduplicated.
    assert_eq!(article.tags, vec!["compute", "serverless"]);
    // Raw fields survive the pipeline unchanged.
    assert_eq!(article.title, "enriched case");
    assert_eq!(article.source_url, "https://example.com/x");
    assert_eq!(article.vendor, "Test");
}

#[tokio::test]
async fn failing_plugin_is_isolated() {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(FailingPlugin));
    registry.register(Arc::new(StaticPlugin::new("static", three_articles())));
    let app = TestApp::new(registry, SummarizerRegistry::new());

    let summary = app.collector.collect_all().await.unwrap();
    assert_eq!(summary.total_new, 3);

    let failing = summary
        .sources
        .iter()
        .find(|s| s.source_name == "failing")
        .unwrap();
    assert_eq!(failing.fetched, 0);
    assert!(!failing.errors.is_empty());

    let state = app.state.source_state("failing").unwrap().unwrap();
    assert_eq!(state.fetch_status, "error");
    assert!(state.error_message.is_some());
}

#[tokio::test]
async fn unknown_source_is_a_typed_error() {
    let app = TestApp::new(PluginRegistry::new(), SummarizerRegistry::new());
    let err = app.collector.collect_from("nope").await.unwrap_err();
    assert!(matches!(err, CollectorError::UnknownSource(name) if name == "nope"));
}

#[tokio::test]
async fn empty_output_triggers_no_recluster() {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(StaticPlugin::new("static", Vec::new())));
    let app = TestApp::new(registry, SummarizerRegistry::new());

    let summary = app.collector.collect_all().await.unwrap();
    assert_eq!(summary.total_new, 0);
    // No items, no clusters, no arms.
    assert!(app.state.all_arms().unwrap().is_empty());
}
