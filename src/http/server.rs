//! HTTP server assembly and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{Result, WayfarerError};
use crate::http::handlers::{self, AppState};
use crate::ratelimit::{enforce, SlidingWindowLimiter};

/// Cadence of the idle-client eviction sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// HTTP server for the travel query API.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Fully assembled router, middleware included
    router: Router,
    /// Limiters owned by the route groups, kept for the eviction sweep
    limiters: Vec<Arc<SlidingWindowLimiter>>,
}

impl HttpServer {
    /// Build the server from configuration and its collaborators.
    ///
    /// The two limiters are constructed by the caller, so which policy
    /// guards which route group stays visible at the composition root.
    pub fn new(
        config: &ServerConfig,
        state: AppState,
        query_limiter: Arc<SlidingWindowLimiter>,
        history_limiter: Arc<SlidingWindowLimiter>,
    ) -> Result<Self> {
        let cors = cors_layer(&config.allowed_origins)?;
        let router = build_router(state, query_limiter.clone(), history_limiter.clone(), cors);

        Ok(Self {
            addr: config.http_addr,
            router,
            limiters: vec![query_limiter, history_limiter],
        })
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        self.start_sweepers();

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            WayfarerError::Io(e)
        })
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// In-flight requests drain once the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.start_sweepers();

        info!(addr = %self.addr, "Starting HTTP server with graceful shutdown");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            WayfarerError::Io(e)
        })
    }

    fn start_sweepers(&self) {
        for limiter in &self.limiters {
            spawn_idle_sweeper(Arc::clone(limiter));
        }
    }
}

/// Assemble the router: the query route and the history group each sit
/// behind their own admission middleware, the welcome route behind neither.
fn build_router(
    state: AppState,
    query_limiter: Arc<SlidingWindowLimiter>,
    history_limiter: Arc<SlidingWindowLimiter>,
    cors: CorsLayer,
) -> Router {
    let query_routes = Router::new()
        .route("/query", post(handlers::create_query))
        .route_layer(middleware::from_fn_with_state(query_limiter, enforce));

    let history_routes = Router::new()
        .route("/history", get(handlers::list_history))
        .route(
            "/history/{id}",
            get(handlers::get_query).delete(handlers::delete_query),
        )
        .route_layer(middleware::from_fn_with_state(history_limiter, enforce));

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %request.method(),
            path = %request.uri().path(),
        )
    });

    Router::new()
        .route("/", get(handlers::welcome))
        .nest("/api/v1", query_routes.merge(history_routes))
        .with_state(state)
        .layer(trace)
        .layer(cors)
}

/// CORS policy from the configured origin list. A `*` entry opens the API
/// to any origin.
fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|e| {
                WayfarerError::Config(format!("invalid allowed origin {origin:?}: {e}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(layer.allow_origin(origins))
}

/// Periodically drop clients whose whole window has expired, so one-off
/// visitors do not accumulate in the limiter map forever.
fn spawn_idle_sweeper(limiter: Arc<SlidingWindowLimiter>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            limiter.sweep_idle(Instant::now());
        }
    });
}
