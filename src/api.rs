// src/api.rs
//! HTTP surface: `GET /api/news/aggregate`, `GET /health`.
//!
//! Aggregation failures never change the status code; the only non-200
//! answer is 405 for unsupported methods.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::FutureExt;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::orchestrator::{AggregateRequest, AggregationResult, Aggregator};

pub const AGGREGATE_PATH: &str = "/api/news/aggregate";

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

pub fn router(aggregator: Arc<Aggregator>) -> Router {
    create_router(AppState { aggregator })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            AGGREGATE_PATH,
            get(aggregate)
                .head(method_not_allowed)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn aggregate(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<AggregationResult> {
    let req = request_from_query(&q);
    let run = AssertUnwindSafe(state.aggregator.aggregate(&req)).catch_unwind();
    match run.await {
        Ok(result) => Json(result),
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            error!(target: "aggregate", error = %msg, "aggregation panicked");
            Json(AggregationResult::internal_error(msg))
        }
    }
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "Method not allowed" })),
    )
        .into_response()
}

/// Build a request from query params, accepting the legacy names
/// `teamSlug` and `includeTeamFeeds`.
pub fn request_from_query(q: &HashMap<String, String>) -> AggregateRequest {
    let topic_id = q
        .get("topicId")
        .or_else(|| q.get("teamSlug"))
        .map(|raw| decode_once_more(raw).trim().to_string())
        .filter(|s| !s.is_empty());
    let include_topic_feeds = q
        .get("includeTopicFeeds")
        .or_else(|| q.get("includeTeamFeeds"))
        .is_some_and(|v| parse_bool(v));

    AggregateRequest {
        topic_id,
        include_national: q.get("includeNational").is_some_and(|v| parse_bool(v)),
        include_topic_feeds,
    }
}

/// `"true"` / `"1"` → true; anything else → false.
pub fn parse_bool(v: &str) -> bool {
    matches!(v, "true" | "1")
}

// Clients sometimes encode twice; a value that doesn't decode is kept as-is.
fn decode_once_more(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(s) => s.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bool_parsing_is_strict() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("TRUE"));
        assert!(!parse_bool("yes"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn legacy_names_are_accepted() {
        let req = request_from_query(&q(&[("teamSlug", "duke-blue-devils"), ("includeTeamFeeds", "1")]));
        assert_eq!(req.topic_id.as_deref(), Some("duke-blue-devils"));
        assert!(req.include_topic_feeds);
        assert!(!req.include_national);
    }

    #[test]
    fn topic_is_decoded_again_and_trimmed() {
        let req = request_from_query(&q(&[("topicId", "%20acme-tigers%20")]));
        assert_eq!(req.topic_id.as_deref(), Some("acme-tigers"));

        let req = request_from_query(&q(&[("topicId", "100%")]));
        assert_eq!(req.topic_id.as_deref(), Some("100%"));

        let req = request_from_query(&q(&[("topicId", "  ")]));
        assert_eq!(req.topic_id, None);
    }
}
