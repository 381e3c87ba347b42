//! JSON-over-HTTP surface for the feed, topology, sources and actions.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::collector::{CollectorError, CollectorService};
use crate::cooccurrence::CoOccurrenceAnalyzer;
use crate::feed::FeedSelector;
use crate::models::{ActionKind, ClusterInfo, FeedItem, TrendingTechnology};
use crate::plugins::PluginRegistry;
use crate::scheduler::{Scheduler, SchedulerStatus};
use crate::topology::TopologyEngine;

const MAX_FEED_LIMIT: usize = 100;

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub feed: Arc<FeedSelector>,
    pub topology: Arc<TopologyEngine>,
    pub registry: Arc<PluginRegistry>,
    pub collector: Arc<CollectorService>,
    pub scheduler: Arc<Scheduler>,
}

/// Error envelope returned to clients.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        error!("Internal error: {err}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/feed", get(get_feed))
        .route("/api/v1/articles/:id", get(get_article))
        .route("/api/v1/articles/:id/action", post(record_action))
        .route("/api/v1/topology", get(get_topology))
        .route("/api/v1/sources", get(list_sources))
        .route("/api/v1/collect", post(trigger_collection))
        .route("/api/v1/trending", get(get_trending))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: ApiState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    scheduler: SchedulerStatus,
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        scheduler: state.scheduler.status(),
    })
}

#[derive(Deserialize)]
struct FeedParams {
    limit: Option<usize>,
    offset: Option<usize>,
    vendor: Option<String>,
    primary_only: Option<bool>,
}

#[derive(Serialize)]
struct FeedResponse {
    items: Vec<FeedItem>,
    total: usize,
}

async fn get_feed(
    State(state): State<ApiState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedResponse>, ApiError> {
    let limit = params.limit.unwrap_or(20);
    if limit == 0 || limit > MAX_FEED_LIMIT {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_FEED_LIMIT}"
        )));
    }
    let offset = params.offset.unwrap_or(0);

    let items = state
        .feed
        .generate_feed(
            limit,
            params.vendor.as_deref(),
            params.primary_only.unwrap_or(false),
            offset,
        )
        .map_err(ApiError::internal)?;

    let total = items.len();
    Ok(Json(FeedResponse { items, total }))
}

#[derive(Serialize)]
struct ArticleResponse {
    id: String,
    url: String,
    title: String,
    summary: String,
    tags: Vec<String>,
    vendor: String,
    is_primary_source: bool,
    cluster_id: i64,
    published_at: String,
    collected_at: String,
    source_plugin: String,
    tech_domain: String,
}

async fn get_article(
    State(state): State<ApiState>,
    Path(article_id): Path<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state
        .topology
        .get(&article_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    Ok(Json(ArticleResponse {
        id: article.external_id,
        url: article.source_url,
        title: article.title,
        summary: article.summary,
        tags: article.tags,
        vendor: article.vendor,
        is_primary_source: article.is_primary_source,
        cluster_id: article.cluster_id,
        published_at: article
            .published_at
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default(),
        collected_at: article.collected_at.to_rfc3339(),
        source_plugin: article.source_plugin,
        tech_domain: article.tech_domain,
    }))
}

#[derive(Deserialize)]
struct ActionRequest {
    action: String,
}

#[derive(Serialize)]
struct ActionResponse {
    success: bool,
    message: String,
}

async fn record_action(
    State(state): State<ApiState>,
    Path(article_id): Path<String>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let Some(action) = ActionKind::parse(&request.action) else {
        return Err(ApiError::bad_request(
            "Invalid action. Use: click, bookmark, skip",
        ));
    };

    state
        .feed
        .record_action(&article_id, action)
        .map_err(ApiError::internal)?;

    Ok(Json(ActionResponse {
        success: true,
        message: format!(
            "Action '{}' recorded for article {article_id}",
            action.as_str()
        ),
    }))
}

#[derive(Serialize)]
struct TopologyResponse {
    total_articles: u64,
    clusters: Vec<ClusterInfo>,
}

async fn get_topology(State(state): State<ApiState>) -> Result<Json<TopologyResponse>, ApiError> {
    let total_articles = state.topology.total_count().map_err(ApiError::internal)?;
    let clusters = state.topology.topology_info().map_err(ApiError::internal)?;
    Ok(Json(TopologyResponse {
        total_articles,
        clusters,
    }))
}

#[derive(Serialize)]
struct SourceResponse {
    name: String,
    display_name: String,
    vendor: String,
    description: String,
    source_type: String,
}

#[derive(Serialize)]
struct SourcesListResponse {
    sources: Vec<SourceResponse>,
}

async fn list_sources(State(state): State<ApiState>) -> Json<SourcesListResponse> {
    let sources = state
        .registry
        .infos()
        .into_iter()
        .map(|info| SourceResponse {
            name: info.name,
            display_name: info.display_name,
            vendor: info.vendor,
            description: info.description,
            source_type: info.source_type.as_str().to_string(),
        })
        .collect();
    Json(SourcesListResponse { sources })
}

async fn trigger_collection(
    State(state): State<ApiState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summary = state.collector.collect_all().await.map_err(|e| match e {
        CollectorError::UnknownSource(name) => {
            ApiError::not_found(format!("Source not found: {name}"))
        }
        other => ApiError::internal(other),
    })?;

    Ok(Json(serde_json::json!({
        "total_fetched": summary.total_fetched,
        "total_new": summary.total_new,
        "total_processed": summary.total_processed,
        "duration_ms": summary.duration_ms,
        "sources": summary.sources.iter().map(|s| serde_json::json!({
            "name": s.source_name,
            "fetched": s.fetched,
            "new": s.new,
            "processed": s.processed,
            "errors": s.errors,
        })).collect::<Vec<_>>(),
    })))
}

#[derive(Deserialize)]
struct TrendingParams {
    /// Comma-separated declared tech stack.
    stack: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct TrendingResponse {
    trending: Vec<TrendingTechnology>,
}

async fn get_trending(
    State(state): State<ApiState>,
    Query(params): Query<TrendingParams>,
) -> Result<Json<TrendingResponse>, ApiError> {
    let stack: Vec<String> = params
        .stack
        .unwrap_or_default()
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let articles = state.topology.all_articles().map_err(ApiError::internal)?;
    let analyzer = CoOccurrenceAnalyzer::new(&stack, params.limit.unwrap_or(10));
    Ok(Json(TrendingResponse {
        trending: analyzer.analyze(&articles),
    }))
}
