//! HTTP gateway for Pengate.
//!
//! Two routes:
//! - `GET /health`: liveness and version
//! - `POST /api/chat`: one streamed chat session per request (SSE)
//!
//! Requests share nothing but the read-only state built at startup: the
//! configuration, the provider router and the image source. In sandbox
//! canvas mode every request gets its own in-memory document.
//!
//! Built on Axum.

pub mod chat;
pub mod error;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use pengate_agent::AgentMode;
use pengate_canvas::{InMemoryDocument, PlaceholderImageSource};
use pengate_config::AppConfig;
use pengate_core::ImageSource;
use pengate_providers::ProviderRouter;
use pengate_telemetry::SessionLogWriter;
use pengate_tools::CanvasBackend;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

pub use chat::ChatRequest;
pub use error::GatewayError;

/// Canvas context strings can carry a whole document summary.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Shared, read-only application state.
pub struct GatewayState {
    pub config: AppConfig,
    pub providers: ProviderRouter,
    pub images: Arc<dyn ImageSource>,
    pub session_log: Option<SessionLogWriter>,
}

impl GatewayState {
    pub fn new(config: AppConfig, providers: ProviderRouter) -> Self {
        let session_log = config
            .logging
            .sessions
            .then(|| SessionLogWriter::new(&config.logging.session_dir));
        Self {
            config,
            providers,
            images: Arc::new(PlaceholderImageSource::default()),
            session_log,
        }
    }

    /// State with providers built from the configuration.
    pub fn from_config(config: AppConfig) -> Self {
        let providers = pengate_providers::build_from_config(&config);
        Self::new(config, providers)
    }

    pub fn with_images(mut self, images: Arc<dyn ImageSource>) -> Self {
        self.images = images;
        self
    }

    /// Where canvas tools run for a new request.
    pub fn canvas_backend(&self) -> CanvasBackend {
        if self.config.canvas.is_sandbox() {
            CanvasBackend::Sandbox {
                document: pengate_core::document::shared(InMemoryDocument::new()),
                images: self.images.clone(),
            }
        } else {
            CanvasBackend::Relay
        }
    }

    pub fn max_steps(&self, mode: AgentMode) -> usize {
        let steps = match mode {
            AgentMode::Edits => self.config.agent.edits_max_steps,
            AgentMode::Fast => self.config.agent.fast_max_steps,
        };
        steps as usize
    }
}

/// CORS for the editor frontend, credentials included.
pub fn cors_layer(frontend_url: &str) -> Result<CorsLayer, GatewayError> {
    let origin = HeaderValue::from_str(frontend_url.trim_end_matches('/'))
        .map_err(|_| GatewayError::InvalidOrigin(frontend_url.to_string()))?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600)))
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: Arc<GatewayState>) -> Result<Router, GatewayError> {
    let cors = cors_layer(&state.config.gateway.frontend_url)?;
    Ok(Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat::chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http()))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = config.bind_addr();
    let state = Arc::new(GatewayState::from_config(config));
    let app = build_router(state.clone())?;

    info!(
        addr = %addr,
        default_provider = %state.providers.default_provider(),
        providers = ?state.providers.list(),
        canvas = %state.config.canvas.mode,
        sessions = state.session_log.is_some(),
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use pengate_agent::build_system_prompt;
    use pengate_agent::test_helpers::*;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn state_with(provider: Option<Arc<SequentialMockProvider>>) -> Arc<GatewayState> {
        let mut router = ProviderRouter::new("anthropic");
        match provider {
            Some(p) => router.register("anthropic", p, "claude-test"),
            None => router.mark_known("anthropic"),
        }
        router.mark_known("openai");
        Arc::new(GatewayState::new(AppConfig::default(), router))
    }

    fn app(state: Arc<GatewayState>) -> Router {
        build_router(state).unwrap()
    }

    fn chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app(state_with(None))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn empty_messages_is_400_without_model_call() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let response = app(state_with(Some(provider.clone())))
            .oneshot(chat(json!({"messages": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "Invalid request body");
        assert_eq!(body["details"]["messages"][0], "messages must not be empty");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn unconfigured_provider_is_503() {
        let response = app(state_with(None))
            .oneshot(chat(json!({"messages": [{"role": "user", "content": "hi"}]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("anthropic"));
    }

    #[tokio::test]
    async fn override_naming_unconfigured_provider_is_503() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let response = app(state_with(Some(provider)))
            .oneshot(chat(json!({
                "messages": [{"role": "user", "content": "hi"}],
                "model": "openai:gpt-4o"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn chat_streams_sse_events() {
        let provider = Arc::new(SequentialMockProvider::single_text("Hello from the canvas"));
        let response = app(state_with(Some(provider.clone())))
            .oneshot(chat(json!({
                "messages": [{"role": "user", "parts": [{"type": "text", "text": "hi"}]}],
                "canvasContext": "Selected: header",
                "model": "claude-other"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/event-stream"));

        let body = body_string(response).await;
        assert!(body.contains("event: text_delta"));
        assert!(body.contains("event: step_finish"));
        assert!(body.contains("event: finish"));
        assert!(body.contains(r#""finishReason":"stop""#));

        let requests = provider.requests();
        assert_eq!(requests[0].model, "claude-other");
        let base = build_system_prompt(AgentMode::Edits, Some("Selected: header"));
        assert!(base.ends_with("## Current Canvas Context\n\nSelected: header"));
        assert!(requests[0].system.starts_with(&base));
        assert!(requests[0].system.ends_with(pengate_agent::gate::EDITS_RULE));
        assert_eq!(requests[0].messages.len(), 1);
        assert!(!requests[0].tools.iter().any(|t| t.name == "batch_design"));
    }

    #[tokio::test]
    async fn relayed_tool_results_reach_the_model() {
        let provider = Arc::new(SequentialMockProvider::single_text("Using your red."));
        let response = app(state_with(Some(provider.clone())))
            .oneshot(chat(json!({
                "messages": [
                    {"role": "user", "content": "use my colors"},
                    {"role": "assistant", "parts": [
                        {"type": "tool-get_variables", "toolCallId": "c1", "state": "output-available",
                         "input": {}, "output": {"variables": {"--primary": "#FF0000"}}}
                    ]}
                ]
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let _ = body_string(response).await;

        let messages = &provider.requests()[0].messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].tool_calls[0].name, "get_variables");
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
        assert!(messages[2].content.contains("#FF0000"));
    }

    #[tokio::test]
    async fn fast_mode_uses_fast_prompt() {
        let provider = Arc::new(SequentialMockProvider::single_text("ok"));
        let response = app(state_with(Some(provider.clone())))
            .oneshot(chat(json!({
                "messages": [{"role": "user", "content": "a login screen"}],
                "agentMode": "fast"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let _ = body_string(response).await;
        assert!(provider.requests()[0].system.contains("## Mode: fast"));
    }

    #[tokio::test]
    async fn cors_allows_frontend_origin() {
        let response = app(state_with(None))
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/chat")
                    .header("origin", "http://localhost:5173")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(
            headers["access-control-allow-origin"],
            "http://localhost:5173"
        );
        assert_eq!(headers["access-control-allow-credentials"], "true");
    }

    #[test]
    fn bad_origin_is_rejected() {
        assert!(matches!(
            cors_layer("http://bad\norigin"),
            Err(GatewayError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn step_bounds_come_from_config() {
        let state = state_with(None);
        assert_eq!(state.max_steps(AgentMode::Edits), 3);
        assert_eq!(state.max_steps(AgentMode::Fast), 6);
        assert!(matches!(state.canvas_backend(), CanvasBackend::Relay));
    }
}
