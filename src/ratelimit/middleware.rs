//! Request admission middleware.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::WayfarerError;

use super::limiter::SlidingWindowLimiter;

/// Bucket key for requests carrying no connection metadata.
const UNKNOWN_CLIENT: &str = "unknown";

/// Admission gate for a route group.
///
/// Installed with [`axum::middleware::from_fn_with_state`], one instance per
/// protected group, each holding its own limiter. A rejected request is
/// answered here with `429 Too Many Requests` and never reaches the handler.
pub async fn enforce(
    State(limiter): State<Arc<SlidingWindowLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);

    if !limiter.check(&client).is_admitted() {
        return WayfarerError::RateLimited.into_response();
    }

    next.run(request).await
}

/// Identify the client behind a request.
///
/// Uses the peer address when the connect-info extension is present (the
/// server installs it via `into_make_service_with_connect_info`). Requests
/// without one all share a single bucket.
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitPolicy;
    use crate::error::RATE_LIMIT_DETAIL;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(max_requests: u32) -> Router {
        let limiter = Arc::new(
            SlidingWindowLimiter::new(RateLimitPolicy {
                max_requests,
                window_secs: 60,
            })
            .unwrap(),
        );
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(limiter, enforce))
    }

    fn request_from(addr: &str) -> HttpRequest<Body> {
        let mut request = HttpRequest::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = addr.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[tokio::test]
    async fn test_over_limit_returns_429_with_detail() {
        let app = app(1);

        let first = app
            .clone()
            .oneshot(request_from("10.0.0.1:9000"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        // Same IP, different source port: same bucket
        let second = app.oneshot(request_from("10.0.0.1:9001")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = second.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], RATE_LIMIT_DETAIL);
    }

    #[tokio::test]
    async fn test_distinct_addresses_are_independent() {
        let app = app(1);

        let first = app
            .clone()
            .oneshot(request_from("10.0.0.1:9000"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let other = app.oneshot(request_from("10.0.0.2:9000")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_requests_without_connect_info_share_a_bucket() {
        let app = app(1);

        let bare = || {
            HttpRequest::builder()
                .uri("/")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(bare()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(bare()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
