//! HTTP transport server using Axum.
//!
//! Serves the API descriptor (`api.json`, `api.js`) and the router endpoint
//! under a configurable base path, decides whether a router request is a
//! form call or a JSON batch, and writes the reply with the content type
//! the client expects.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use bytes::Bytes;
use direct_protocol::{
    ApiDescriptor, BatchReply, FormReply, FormRequest, RequestContext,
};
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::form::decode_form;

const JAVASCRIPT: &str = "text/javascript";
const HTML: &str = "text/html";

/// Trait implemented by the Direct server to handle decoded requests.
/// The transport calls it for every router request and descriptor fetch.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle a raw body that is not a form call (JSON batch path).
    fn handle_batch(
        &self,
        ctx: RequestContext,
        body: Bytes,
    ) -> impl std::future::Future<Output = BatchReply> + Send;

    /// Handle a form call carrying all `ext*` fields.
    fn handle_form(
        &self,
        ctx: RequestContext,
        request: FormRequest,
    ) -> impl std::future::Future<Output = FormReply> + Send;

    /// Data form of the API descriptor for the given router URL.
    fn api_descriptor(&self, url: &str) -> ApiDescriptor;

    /// Script form of the API descriptor for the given router URL.
    fn api_script(&self, url: &str) -> Result<String, serde_json::Error>;
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Path prefix the endpoints are mounted under (empty or "/" for root)
    pub base_path: String,
    /// Router URL advertised in the descriptor, if it differs from the
    /// mounted path (e.g. behind a reverse proxy)
    pub router_url: Option<String>,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum accepted request body size
    pub max_body_bytes: usize,
    /// Enable per-request HTTP tracing
    pub verbose_logging: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 7070,
            hostname: "127.0.0.1".into(),
            base_path: "/api".into(),
            router_url: None,
            enable_cors: false,
            max_body_bytes: 10 * 1024 * 1024,
            verbose_logging: false,
        }
    }
}

impl TransportConfig {
    /// Normalized mount prefix: no trailing slash, empty for root.
    fn mount_path(&self) -> String {
        let trimmed = self.base_path.trim_end_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    /// URL clients post calls to.
    pub fn router_url(&self) -> String {
        self.router_url
            .clone()
            .unwrap_or_else(|| format!("{}/router", self.mount_path()))
    }
}

/// Shared state for the transport server.
struct AppState<H: RequestHandler> {
    handler: Arc<H>,
    config: TransportConfig,
    router_url: String,
    /// Router requests served (for health check)
    requests: AtomicU64,
}

/// The transport server. Owns the listener task.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Start the transport server with the given request handler.
    pub async fn start<H: RequestHandler>(
        config: TransportConfig,
        handler: H,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_shared(config, Arc::new(handler)).await
    }

    /// Start the transport server with a handler shared with other owners.
    pub async fn start_shared<H: RequestHandler>(
        config: TransportConfig,
        handler: Arc<H>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let app = Self::router(config.clone(), handler);

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!(
            "Direct transport listening on http://{}:{}{}",
            config.hostname,
            actual_port,
            config.router_url()
        );

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
            {
                error!("Direct transport stopped with error: {e}");
            }
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Build the axum router without binding a socket.
    pub fn router<H: RequestHandler>(config: TransportConfig, handler: Arc<H>) -> Router {
        let mount = config.mount_path();
        let router_url = config.router_url();
        let enable_cors = config.enable_cors;
        let verbose = config.verbose_logging;
        let body_limit = config.max_body_bytes;

        let state = Arc::new(AppState {
            handler,
            config,
            router_url,
            requests: AtomicU64::new(0),
        });

        let endpoints = Router::new()
            .route("/api.json", get(api_json_handler::<H>))
            .route("/api.js", get(api_js_handler::<H>))
            .route("/router", post(router_handler::<H>))
            .route("/router/", post(router_handler::<H>))
            .route("/health", get(health_handler::<H>))
            .with_state(state);

        let mut app = if mount.is_empty() {
            endpoints
        } else {
            Router::new().nest(&mount, endpoints)
        };

        app = app.layer(DefaultBodyLimit::max(body_limit));
        if enable_cors {
            app = app.layer(CorsLayer::permissive());
        }
        if verbose {
            app = app.layer(TraceLayer::new_for_http());
        }
        app
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("Direct transport server stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn api_json_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(state.handler.api_descriptor(&state.router_url))
}

async fn api_js_handler<H: RequestHandler>(State(state): State<Arc<AppState<H>>>) -> Response {
    match state.handler.api_script(&state.router_url) {
        Ok(script) => ([(header::CONTENT_TYPE, JAVASCRIPT)], script).into_response(),
        Err(e) => {
            error!("Failed to render API script: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "requests": state.requests.load(Ordering::Relaxed),
    }))
}

/// Router endpoint: form fields first, raw JSON body otherwise.
async fn router_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    request: Request,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let ctx = RequestContext::new(request_id.clone());
    state.requests.fetch_add(1, Ordering::Relaxed);

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Unreadable request body ({request_id}): {e}");
            return Json(BatchReply::malformed(e.to_string())).into_response();
        }
    };

    if let Some(form) = decode_form(parts, body.clone()).await.and_then(FormRequest::from_fields) {
        debug!("Form call {}.{} ({request_id})", form.action, form.method);
        return form_response(state.handler.handle_form(ctx, form).await);
    }

    Json(state.handler.handle_batch(ctx, body).await).into_response()
}

fn form_response(reply: FormReply) -> Response {
    match reply {
        FormReply::Json(record) => Json(record).into_response(),
        FormReply::Upload(record) => match serde_json::to_string(&record) {
            Ok(body) => ([(header::CONTENT_TYPE, HTML)], body).into_response(),
            Err(e) => {
                error!("Failed to encode upload response: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
    }
}
