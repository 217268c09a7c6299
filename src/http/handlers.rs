//! Request handlers for the travel query API.

use std::sync::{Arc, LazyLock};

use axum::extract::{Path, Query, State};
use axum::Json;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::advisor::TravelAdvisor;
use crate::error::{Result, WayfarerError};
use crate::history::{HistoryStore, QueryRecord};

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    advisor: Arc<dyn TravelAdvisor>,
    store: Arc<HistoryStore>,
}

impl AppState {
    pub fn new(advisor: Arc<dyn TravelAdvisor>, store: Arc<HistoryStore>) -> Self {
        Self { advisor, store }
    }
}

/// Body of `POST /api/v1/query`. Only the free-text query is required;
/// origin and destination are extracted from it when absent.
#[derive(Debug, Deserialize)]
pub struct TravelQueryRequest {
    pub query: String,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

/// Query string of `GET /api/v1/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u32>,
}

/// `GET /` welcome body.
pub async fn welcome() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Wayfarer Travel API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/v1/query`: ask the advisor about a trip and store the result.
pub async fn create_query(
    State(state): State<AppState>,
    Json(payload): Json<TravelQueryRequest>,
) -> Result<Json<QueryRecord>> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(WayfarerError::InvalidQuery(
            "Query is required and must be a non-empty string".to_string(),
        ));
    }

    let (extracted_origin, extracted_destination) = extract_route(query);
    let destination = payload
        .destination
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(extracted_destination);
    let origin = payload
        .origin
        .filter(|o| !o.trim().is_empty())
        .or(extracted_origin);

    info!(destination = %destination, "Processing travel query");

    let report = state
        .advisor
        .advise(query, &destination, origin.as_deref())
        .await?;

    let record = state
        .store
        .insert(query, &destination, origin.as_deref(), &report)
        .await?;

    Ok(Json(record))
}

/// `GET /api/v1/history`: stored queries, newest first.
pub async fn list_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<QueryRecord>>> {
    let records = state.store.list_recent(params.limit).await?;
    Ok(Json(records))
}

/// `GET /api/v1/history/{id}`: single stored query.
pub async fn get_query(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<QueryRecord>> {
    let record = state.store.get(id).await?.ok_or(WayfarerError::NotFound)?;
    Ok(Json(record))
}

/// `DELETE /api/v1/history/{id}`: remove a stored query.
pub async fn delete_query(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    if !state.store.delete(id).await? {
        return Err(WayfarerError::NotFound);
    }
    Ok(Json(json!({ "message": "Query deleted successfully" })))
}

static ROUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:from|travel(?:ing)? from)\s+([a-zA-Z\s]+)\s+(?:to|visit(?:ing)?)\s+([a-zA-Z\s]+)")
        .expect("route pattern is valid")
});

static DESTINATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:to|visit(?:ing)?)\s+([a-zA-Z\s]+)").expect("destination pattern is valid")
});

/// Pull origin and destination out of free text ("from X to Y",
/// "visiting Y"). Falls back to a placeholder destination so a vague query
/// still produces a usable record.
fn extract_route(query: &str) -> (Option<String>, String) {
    let mut origin = None;
    let mut destination = None;

    if let Some(caps) = ROUTE_PATTERN.captures(query) {
        origin = non_empty(caps[1].trim());
        destination = non_empty(caps[2].trim());
    } else if let Some(caps) = DESTINATION_PATTERN.captures(query) {
        destination = non_empty(caps[1].trim());
    }

    (
        origin,
        destination.unwrap_or_else(|| "Unknown destination".to_string()),
    )
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::TravelReport;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct ScriptedAdvisor;

    #[async_trait]
    impl TravelAdvisor for ScriptedAdvisor {
        async fn advise(
            &self,
            _query: &str,
            destination: &str,
            origin: Option<&str>,
        ) -> Result<TravelReport> {
            Ok(TravelReport {
                destination: destination.to_string(),
                origin: origin.unwrap_or("Not specified").to_string(),
                visa_requirements: "Visa-free up to 90 days".to_string(),
                documents: vec!["Passport".to_string()],
                advisories: vec![],
                estimated_processing_time: "None required".to_string(),
                embassy_information: format!(
                    "Contact the {destination} embassy for more information"
                ),
                timestamp: "2025-03-01T12:00:00+00:00".to_string(),
            })
        }
    }

    struct FailingAdvisor;

    #[async_trait]
    impl TravelAdvisor for FailingAdvisor {
        async fn advise(
            &self,
            _query: &str,
            _destination: &str,
            _origin: Option<&str>,
        ) -> Result<TravelReport> {
            Err(WayfarerError::Advisor("model unavailable".to_string()))
        }
    }

    fn app(advisor: Arc<dyn TravelAdvisor>) -> Router {
        let state = AppState::new(advisor, Arc::new(HistoryStore::open_in_memory().unwrap()));
        Router::new()
            .route("/", get(welcome))
            .route("/api/v1/query", post(create_query))
            .route("/api/v1/history", get(list_history))
            .route(
                "/api/v1/history/{id}",
                get(get_query).delete(delete_query),
            )
            .with_state(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_query(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/query")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_path(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_create_query_returns_stored_record() {
        let app = app(Arc::new(ScriptedAdvisor));

        let response = app
            .oneshot(post_query(
                json!({ "query": "I am traveling from France to Japan next month" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["destination"], "Japan next month");
        assert_eq!(body["origin"], "France");
        assert_eq!(body["response"]["visaRequirements"], "Visa-free up to 90 days");
        assert!(body["created_at"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_create_query_prefers_explicit_fields() {
        let app = app(Arc::new(ScriptedAdvisor));

        let response = app
            .oneshot(post_query(json!({
                "query": "Do I need a visa to visit Japan?",
                "destination": "Japan",
                "origin": "Brazil",
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["destination"], "Japan");
        assert_eq!(body["origin"], "Brazil");
    }

    #[tokio::test]
    async fn test_create_query_rejects_blank_query() {
        let app = app(Arc::new(ScriptedAdvisor));

        let response = app
            .oneshot(post_query(json!({ "query": "   " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(
            body["detail"],
            "Query is required and must be a non-empty string"
        );
    }

    #[tokio::test]
    async fn test_advisor_failure_maps_to_bad_gateway() {
        let app = app(Arc::new(FailingAdvisor));

        let response = app
            .oneshot(post_query(json!({ "query": "visiting Japan" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["detail"], "model unavailable");
    }

    #[tokio::test]
    async fn test_get_missing_record_is_404() {
        let app = app(Arc::new(ScriptedAdvisor));

        let response = app.oneshot(get_path("/api/v1/history/99")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["detail"], "Query not found");
    }

    #[tokio::test]
    async fn test_history_lists_newest_first_with_limit() {
        let app = app(Arc::new(ScriptedAdvisor));

        for destination in ["France", "Japan", "Brazil"] {
            let response = app
                .clone()
                .oneshot(post_query(json!({
                    "query": "planning a trip",
                    "destination": destination,
                })))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(get_path("/api/v1/history?limit=2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["destination"], "Brazil");
        assert_eq!(records[1]["destination"], "Japan");
    }

    #[tokio::test]
    async fn test_delete_then_get_is_404() {
        let app = app(Arc::new(ScriptedAdvisor));

        let response = app
            .clone()
            .oneshot(post_query(json!({ "query": "visiting Japan" })))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/history/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["message"],
            "Query deleted successfully"
        );

        let response = app
            .oneshot(get_path(&format!("/api/v1/history/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_welcome_names_the_service() {
        let app = app(Arc::new(ScriptedAdvisor));

        let response = app.oneshot(get_path("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Welcome to the Wayfarer Travel API");
    }

    #[test]
    fn test_extract_route_from_and_to() {
        let (origin, destination) = extract_route("I am traveling from France to Japan");
        assert_eq!(origin.as_deref(), Some("France"));
        assert_eq!(destination, "Japan");
    }

    #[test]
    fn test_extract_route_destination_only() {
        let (origin, destination) = extract_route("what do I need when visiting New Zealand");
        assert_eq!(origin, None);
        assert_eq!(destination, "New Zealand");
    }

    #[test]
    fn test_extract_route_falls_back_to_placeholder() {
        let (origin, destination) = extract_route("what documents do I need?");
        assert_eq!(origin, None);
        assert_eq!(destination, "Unknown destination");
    }
}
