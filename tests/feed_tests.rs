mod common;

use brainstream::models::{ActionKind, Article, NOISE_CLUSTER};
use brainstream::plugins::PluginRegistry;
use brainstream::summarizer::SummarizerRegistry;
use chrono::{TimeZone, Utc};

use common::TestApp;

fn stored_article(id: &str, title: &str, vendor: &str, day: u32, primary: bool) -> Article {
    Article {
        external_id: id.to_string(),
        source_url: format!("https://example.com/{id}"),
        title: title.to_string(),
        content: String::new(),
        summary: title.to_string(),
        tags: vec![],
        vendor: vendor.to_string(),
        published_at: Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
        is_primary_source: primary,
        tech_domain: String::new(),
        source_plugin: "test".to_string(),
        collected_at: Utc::now(),
        cluster_id: NOISE_CLUSTER,
    }
}

fn empty_app() -> TestApp {
    TestApp::new(PluginRegistry::new(), SummarizerRegistry::new())
}

/// Five-article topic group with ids `<prefix>0..<prefix>4`, oldest first.
fn topic_group(prefix: &str, title: &str, vendor: &str) -> Vec<Article> {
    (0..5)
        .map(|i| {
            stored_article(
                &format!("{prefix}{i}"),
                title,
                vendor,
                i as u32 + 1,
                false,
            )
        })
        .collect()
}

fn two_cluster_app() -> TestApp {
    let app = empty_app();
    let mut articles = topic_group("d", "database storage engine release", "AWS");
    articles.extend(topic_group("k", "kubernetes container orchestration update", "GCP"));
    app.topology.ingest(&articles).unwrap();
    app.topology.recluster().unwrap();
    app
}

#[tokio::test]
async fn ingest_is_idempotent() {
    let app = empty_app();
    let articles = topic_group("d", "database storage engine release", "AWS");
    assert_eq!(app.topology.ingest(&articles).unwrap(), 5);
    assert_eq!(app.topology.ingest(&articles).unwrap(), 0);
    assert_eq!(app.topology.total_count().unwrap(), 5);
}

#[tokio::test]
async fn no_arms_falls_back_to_latest() {
    let app = empty_app();
    let articles = topic_group("d", "database storage engine release", "AWS");
    app.topology.ingest(&articles).unwrap();
    // No recluster: no arms yet.

    let feed = app.feed_selector(3).generate_feed(3, None, false, 0).unwrap();
    let ids: Vec<&str> = feed.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["d4", "d3", "d2"]);

    // Offset pages through the same ordering.
    let page2 = app.feed_selector(3).generate_feed(3, None, false, 3).unwrap();
    let ids2: Vec<&str> = page2.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids2, vec!["d1", "d0"]);
}

#[tokio::test]
async fn actions_update_arms_and_log() {
    let app = two_cluster_app();
    let selector = app.feed_selector(42);

    let cluster0 = app.topology.cluster_articles(0, 5, true).unwrap();
    assert_eq!(cluster0.len(), 5);

    for i in 0..20 {
        let article = &cluster0[i % cluster0.len()];
        selector
            .record_action(&article.external_id, ActionKind::Click)
            .unwrap();
    }

    let arm0 = app.state.get_arm(0).unwrap().unwrap();
    let arm1 = app.state.get_arm(1).unwrap().unwrap();
    assert_eq!(arm0.alpha, 21.0);
    assert_eq!(arm0.beta, 1.0);
    assert_eq!(arm1.alpha, 1.0);
    assert_eq!(arm1.beta, 1.0);
    assert_eq!(app.state.action_count().unwrap(), 20);
}

#[tokio::test]
async fn rewarded_cluster_dominates_the_feed() {
    let app = two_cluster_app();
    let selector = app.feed_selector(42);

    let cluster0 = app.topology.cluster_articles(0, 5, true).unwrap();
    for i in 0..20 {
        let article = &cluster0[i % cluster0.len()];
        selector
            .record_action(&article.external_id, ActionKind::Click)
            .unwrap();
    }

    // With arm 0 at (21,1) and arm 1 at (1,1), cluster 0 leads the page in
    // 21/22 of draws. 200 seeded pages clear 0.85 with a wide margin.
    let mut cluster0_first = 0;
    for _ in 0..200 {
        let feed = selector.generate_feed(4, None, false, 0).unwrap();
        assert!(!feed.is_empty());
        if feed[0].cluster_id == 0 {
            cluster0_first += 1;
        }
    }
    assert!(
        cluster0_first as f64 / 200.0 > 0.85,
        "cluster 0 led only {cluster0_first}/200 pages"
    );
}

#[tokio::test]
async fn skip_bumps_beta() {
    let app = two_cluster_app();
    let selector = app.feed_selector(42);
    let cluster1 = app.topology.cluster_articles(1, 1, true).unwrap();

    selector
        .record_action(&cluster1[0].external_id, ActionKind::Skip)
        .unwrap();

    let arm1 = app.state.get_arm(1).unwrap().unwrap();
    assert_eq!(arm1.alpha, 1.0);
    assert_eq!(arm1.beta, 2.0);
}

#[tokio::test]
async fn noise_articles_do_not_steer_the_bandit() {
    let app = empty_app();
    let articles = topic_group("d", "database storage engine release", "AWS");
    app.topology.ingest(&articles).unwrap();
    // No recluster: everything is still noise.

    let selector = app.feed_selector(1);
    selector.record_action("d0", ActionKind::Click).unwrap();
    assert_eq!(app.state.action_count().unwrap(), 0);

    // Unknown article is a warning no-op, not an error.
    selector.record_action("ghost", ActionKind::Click).unwrap();
    assert_eq!(app.state.action_count().unwrap(), 0);
}

#[tokio::test]
async fn serendipity_slots_carry_boundary_articles() {
    let app = empty_app();
    let mut articles = topic_group("a", "database storage engine release", "AWS");
    articles.extend(topic_group("b", "kubernetes container orchestration update", "GCP"));
    articles.extend(topic_group("c", "javascript frontend framework tooling", "Test"));
    app.topology.ingest(&articles).unwrap();
    let counts = app.topology.recluster().unwrap();
    assert_eq!(counts.len(), 3);

    let selector = app.feed_selector(7);
    let feed = selector.generate_feed(10, None, false, 0).unwrap();

    // main_slots = 8, 2 per cluster from 3 clusters, then 2 boundary items.
    assert_eq!(feed.len(), 8);

    let mut seen = std::collections::HashSet::new();
    assert!(feed.iter().all(|item| seen.insert(item.id.clone())));

    // Each cluster contributes exactly its newest two to the main block.
    for cluster_id in 0..3 {
        let main_count = feed[..6]
            .iter()
            .filter(|i| i.cluster_id == cluster_id)
            .count();
        assert_eq!(main_count, 2);
    }

    // The reserved tail holds boundary members of their clusters.
    for item in &feed[6..] {
        let boundary = app
            .topology
            .boundary_articles(item.cluster_id, 3)
            .unwrap();
        assert!(
            boundary.iter().any(|(a, _)| a.external_id == item.id),
            "{} is not a boundary article of cluster {}",
            item.id,
            item.cluster_id
        );
    }
}

#[tokio::test]
async fn vendor_filter_is_strict() {
    let app = two_cluster_app();
    let selector = app.feed_selector(11);

    let feed = selector.generate_feed(10, Some("aws"), false, 0).unwrap();
    assert!(!feed.is_empty());
    assert!(feed.iter().all(|i| i.vendor.eq_ignore_ascii_case("aws")));
}

#[tokio::test]
async fn primary_only_filter() {
    let app = empty_app();
    let mut articles = topic_group("d", "database storage engine release", "AWS");
    articles[0].is_primary_source = true;
    app.topology.ingest(&articles).unwrap();

    let selector = app.feed_selector(5);
    let feed = selector.generate_feed(10, None, true, 0).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, "d0");
}

#[tokio::test]
async fn page_never_exceeds_limit() {
    let app = two_cluster_app();
    let selector = app.feed_selector(13);
    for limit in [1, 3, 5, 10] {
        let feed = selector.generate_feed(limit, None, false, 0).unwrap();
        assert!(feed.len() <= limit);
    }
}
