//! HTTP surface for the sidecar client
//!
//! Exposes a connected [`Client`] over three endpoints: `POST /query` returns
//! the complete answer as JSON, `POST /stream` relays partial content as
//! Server-Sent Events, and `GET /health` reports whether the sidecar answers a
//! ping. Request handling is deliberately thin; all session and cancellation
//! logic lives in the client.

pub mod error;
pub mod sse;

pub use error::{Result, ServerError};
pub use sse::{event_payload, SseStream};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use serde::{Deserialize, Serialize};
use sidecar_client::Client;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Body of `POST /query` and `POST /stream`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub prompt: String,
    /// Continue an existing conversation instead of starting a new one.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response of `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub content: String,
    pub session_id: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    fn new(status: &str, error: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            error,
        }
    }
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
    /// Keep-alive interval for SSE connections
    pub sse_keepalive_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            enable_cors: true,
            cors_origins: None,
            max_body_size: 1024 * 1024, // 1MB
            enable_logging: true,
            sse_keepalive_interval: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    /// Enable or disable CORS.
    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Set allowed CORS origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Enable or disable request logging.
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    /// Set SSE keep-alive interval.
    pub fn with_sse_keepalive(mut self, interval: Duration) -> Self {
        self.sse_keepalive_interval = interval;
        self
    }
}

/// Shared application state containing the client and configuration.
#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub config: ServerConfig,
}

fn parse_request(body: &[u8]) -> Result<QueryRequest> {
    let request: QueryRequest =
        serde_json::from_slice(body).map_err(|_| ServerError::InvalidBody)?;

    if request.prompt.trim().is_empty() {
        return Err(ServerError::PromptRequired);
    }
    Ok(request)
}

/// Handler for the /query POST endpoint.
///
/// The query runs on its own task so that a client disconnect, which drops
/// this handler, cancels it and aborts the message on the sidecar.
async fn query_handler(
    State(app_state): State<AppState>,
    body: Bytes,
) -> Result<Json<QueryResponse>> {
    let request = parse_request(&body)?;
    log::debug!(
        "Received query request (session: {:?})",
        request.session_id
    );

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let client = app_state.client.clone();

    let result = tokio::spawn(async move {
        client
            .query_with_session(&cancel, request.session_id.as_deref(), &request.prompt)
            .await
    })
    .await
    .map_err(|e| ServerError::internal(format!("query task failed: {}", e)))??;

    Ok(Json(QueryResponse {
        content: result.content,
        session_id: result.session_id,
    }))
}

/// Handler for the /stream POST endpoint.
async fn stream_handler(State(app_state): State<AppState>, body: Bytes) -> Result<Response> {
    let request = parse_request(&body)?;
    log::debug!(
        "Received stream request (session: {:?})",
        request.session_id
    );

    let cancel = CancellationToken::new();
    let events = app_state
        .client
        .query_stream(&cancel, request.session_id.as_deref(), &request.prompt)
        .await?;

    let session_id = events.session_id().to_string();
    let stream = SseStream::new(events, session_id, Some(cancel.drop_guard()));

    Ok(sse::create_sse_response_with_keepalive(
        stream,
        app_state.config.sse_keepalive_interval,
        "keep-alive",
    ))
}

/// Handler for the /health GET endpoint.
async fn health_handler(State(app_state): State<AppState>) -> Response {
    match app_state.client.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::new("healthy", None))).into_response(),
        Err(e) => {
            log::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::new("unhealthy", Some(e.to_string()))),
            )
                .into_response()
        }
    }
}

/// The HTTP server in front of a sidecar client.
pub struct SidecarServer {
    client: Client,
    config: ServerConfig,
}

impl SidecarServer {
    /// Create a new server with the given client and default configuration.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            config: ServerConfig::default(),
        }
    }

    /// Create a new server with custom configuration.
    pub fn with_config(client: Client, config: ServerConfig) -> Self {
        Self { client, config }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            client: self.client.clone(),
            config: self.config.clone(),
        };

        let mut router = Router::new()
            .route(
                "/query",
                post(query_handler).options(|| async { StatusCode::OK }),
            )
            .route(
                "/stream",
                post(stream_handler).options(|| async { StatusCode::OK }),
            )
            .route("/health", get(health_handler))
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<axum::body::Body>,
                 next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();

                    // Health probes are frequent; keep them out of the info log.
                    if uri.path() == "/health" {
                        log::debug!("Request {} {} {}", request_id, method, uri);
                    } else {
                        log::info!("Request {} {} {}", request_id, method, uri);
                    }

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    let duration = start.elapsed();

                    if uri.path() == "/health" {
                        log::debug!(
                            "Response {} {} in {:?}",
                            request_id,
                            response.status(),
                            duration
                        );
                    } else {
                        log::info!(
                            "Response {} {} in {:?}",
                            request_id,
                            response.status(),
                            duration
                        );
                    }

                    response
                },
            ));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors_layer = if let Some(ref origins) = self.config.cors_origins {
                let origins: std::result::Result<Vec<HeaderValue>, _> =
                    origins.iter().map(|s| s.parse()).collect();
                match origins {
                    Ok(origins) => CorsLayer::new()
                        .allow_origin(origins)
                        .allow_methods(Any)
                        .allow_headers(Any),
                    Err(_) => {
                        log::warn!("Invalid CORS origin configured, allowing any origin");
                        CorsLayer::permissive()
                    }
                }
            } else {
                CorsLayer::permissive()
            };
            router = router.layer(cors_layer);
        }

        router
    }

    async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr).await.map_err(|e| {
            ServerError::config_error(format!(
                "Failed to bind to {}: {}",
                self.config.bind_addr, e
            ))
        })
    }

    fn log_endpoints(&self) {
        log::info!("Query endpoint: http://{}/query", self.config.bind_addr);
        log::info!("Stream endpoint: http://{}/stream", self.config.bind_addr);
        log::info!("Health check: http://{}/health", self.config.bind_addr);
    }

    /// Start the server and listen for connections.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        let router = self.build_router();
        let listener = self.bind().await?;

        log::info!("Sidecar server starting on {}", self.config.bind_addr);
        self.log_endpoints();

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server will shut down when the provided shutdown signal is received.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = self.bind().await?;

        log::info!(
            "Sidecar server starting on {} with graceful shutdown",
            self.config.bind_addr
        );
        self.log_endpoints();

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("Sidecar server shut down gracefully");
        Ok(())
    }
}

/// Utility function to create a shutdown signal from Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
