//! HTTP API gateway for docassist.
//!
//! - `GET  /health`       - liveness probe
//! - `POST /chat`         - answer a query, return `{answer, exit_reason}`
//! - `POST /chat/stream`  - answer a query as a server-sent event stream
//!
//! Built on Axum. Blocking runs go through `spawn_blocking`; streaming runs
//! relay [`AgentEvent`]s and close with a `final_reason` event.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode, header},
    response::sse::{Event as SseEvent, Sse},
    response::Json,
    routing::{get, post},
};
use docassist_agent::{Agent, AgentEvent, AgentState};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Agent,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// The provider, the documentation index and both caches are built once
/// and shared by every request.
pub async fn start(config: docassist_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = docassist_providers::from_config(&config)?;
    let tools = docassist_tools::default_registry(&config)?;
    let agent = Agent::from_config(Arc::new(provider), Arc::new(tools), &config)?;

    let app = build_router(Arc::new(GatewayState { agent }));

    info!(addr = %addr, model = %config.model, "Gateway starting");
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

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub exit_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, detail: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.to_string(),
        }),
    )
}

fn require_query(payload: ChatRequest) -> Result<String, ApiError> {
    if payload.query.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "EMPTY_INPUT"));
    }
    Ok(payload.query)
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let query = require_query(payload)?;
    info!(query_len = query.len(), "chat request");

    let agent = state.agent.clone();
    let final_state = tokio::task::spawn_blocking(move || agent.run_blocking(&query))
        .await
        .map_err(|e| {
            error!(error = %e, "Agent run failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR")
        })?;

    Ok(Json(ChatResponse {
        answer: final_state.answer().to_string(),
        exit_reason: final_state.exit_reason.map(|r| r.as_str().to_string()),
    }))
}

// --- SSE Streaming ---

/// One event as sent to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl ClientEvent {
    fn error(detail: &str) -> Self {
        Self {
            event: "error".into(),
            data: serde_json::json!({ "type": "error", "detail": detail }),
        }
    }
}

impl From<&AgentEvent> for ClientEvent {
    fn from(event: &AgentEvent) -> Self {
        Self {
            event: event.event_type().to_string(),
            data: serde_json::to_value(event).unwrap_or_default(),
        }
    }
}

/// Events closing a stream once the run's final state is known.
///
/// Budget exits still carry an answer, so only other terminal reasons are
/// reported as errors before the closing `final_reason`.
pub fn closing_events(state: &AgentState) -> Vec<ClientEvent> {
    let mut events = Vec::with_capacity(2);
    if let Some(reason) = state.exit_reason.filter(|r| r.is_client_error()) {
        events.push(ClientEvent::error(reason.as_str()));
    }
    let reason = state.exit_reason.map(|r| r.as_str()).unwrap_or("UNKNOWN");
    events.push(ClientEvent {
        event: "final_reason".into(),
        data: serde_json::json!({ "type": "final_reason", "exit_reason": reason }),
    });
    events
}

/// Forward agent events to the client, replacing `final_state` with the
/// closing events. A run that ends without a final state is reported as an
/// internal error.
pub async fn relay(mut events: mpsc::Receiver<AgentEvent>, out: mpsc::Sender<ClientEvent>) {
    let mut closed = false;

    while let Some(event) = events.recv().await {
        let outgoing = match &event {
            AgentEvent::FinalState { state } => {
                closed = true;
                closing_events(state)
            }
            AgentEvent::Error { .. } => {
                closed = true;
                vec![ClientEvent::from(&event)]
            }
            _ => vec![ClientEvent::from(&event)],
        };
        for client_event in outgoing {
            if out.send(client_event).await.is_err() {
                info!("Client disconnected from stream");
                return;
            }
        }
        if closed {
            return;
        }
    }

    error!("Agent stream ended without a final state");
    let _ = out.send(ClientEvent::error("INTERNAL_SERVER_ERROR")).await;
}

/// `POST /chat/stream`: answer a query as a stream of server-sent events.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let query = require_query(payload)?;
    info!(query_len = query.len(), "chat/stream SSE request");

    let events = state.agent.run_stream(&query);
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(relay(events, tx));

    let stream = ReceiverStream::new(rx).map(|event: ClientEvent| {
        Ok(SseEvent::default()
            .event(event.event)
            .data(event.data.to_string()))
    });

    Ok(Sse::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use docassist_agent::{AgentSettings, ExitReason, RetryPolicy};
    use docassist_core::error::ProviderError;
    use docassist_core::message::Message;
    use docassist_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use docassist_tools::{Document, KeywordStore};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Lightweight mock provider for gateway tests.
    struct MockProvider {
        reply: Result<String, ProviderError>,
    }

    impl MockProvider {
        fn respond(&self) -> Result<ProviderResponse, ProviderError> {
            let text = self.reply.clone()?;
            Ok(ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model: "mock-model".into(),
            })
        }
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.respond()
        }

        fn complete_blocking(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.respond()
        }
    }

    fn test_state(reply: Result<String, ProviderError>) -> SharedState {
        let config = docassist_config::AppConfig::default();
        let store = KeywordStore::from_documents([Document::new(
            "staking.md",
            "Stake tokens with the CLI.",
        )]);
        let tools = docassist_tools::registry_with_store(Arc::new(store), &config).unwrap();
        let settings = AgentSettings {
            llm_retry: RetryPolicy::none(),
            tool_retry: RetryPolicy::none(),
            ..AgentSettings::default()
        };
        let agent = Agent::new(Arc::new(MockProvider { reply }), Arc::new(tools)).with_settings(settings);
        Arc::new(GatewayState { agent })
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn sse_event_names(body: &str) -> Vec<String> {
        body.lines()
            .filter_map(|line| line.strip_prefix("event:"))
            .map(|name| name.trim().to_string())
            .collect()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(Ok("hi".into())));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chat_returns_answer_and_exit_reason() {
        let app = build_router(test_state(Ok("Use the CLI.".into())));

        let response = app
            .oneshot(post_json("/chat", serde_json::json!({"query": "How do I stake?"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ChatResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body.answer, "Use the CLI.");
        assert_eq!(body.exit_reason.as_deref(), Some("COMPLETED"));
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        for uri in ["/chat", "/chat/stream"] {
            let app = build_router(test_state(Ok("unused".into())));
            let response = app
                .oneshot(post_json(uri, serde_json::json!({"query": "   "})))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(body.detail, "EMPTY_INPUT");
        }
    }

    #[tokio::test]
    async fn stream_closes_with_final_reason() {
        let app = build_router(test_state(Ok("Use the CLI.".into())));

        let response = app
            .oneshot(post_json("/chat/stream", serde_json::json!({"query": "How do I stake?"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert_eq!(
            sse_event_names(&body),
            vec!["message_start", "token", "message_end", "final_reason"]
        );
        assert!(body.contains(r#""exit_reason":"COMPLETED""#));
        assert!(!body.contains("final_state"));
    }

    #[tokio::test]
    async fn stream_reports_rate_limit_as_error_then_reason() {
        let app = build_router(test_state(Err(ProviderError::RateLimited { retry_after_secs: 1 })));

        let response = app
            .oneshot(post_json("/chat/stream", serde_json::json!({"query": "hello"})))
            .await
            .unwrap();

        let body = body_text(response).await;
        assert_eq!(sse_event_names(&body), vec!["error", "final_reason"]);
        assert!(body.contains(r#""detail":"RATE_LIMITED""#));
        assert!(body.contains(r#""exit_reason":"RATE_LIMITED""#));
    }

    #[test]
    fn budget_exits_close_without_error() {
        let mut state = AgentState::new("q");
        state.exit_reason = Some(ExitReason::MaxTurnsReached);
        let events = closing_events(&state);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "final_reason");
        assert_eq!(events[0].data["exit_reason"], "MAX_TURNS_REACHED");
    }

    #[test]
    fn missing_exit_reason_is_unknown() {
        let events = closing_events(&AgentState::new("q"));
        assert_eq!(events[0].data["exit_reason"], "UNKNOWN");
    }

    #[tokio::test]
    async fn relay_without_final_state_reports_internal_error() {
        let (agent_tx, agent_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        agent_tx
            .send(AgentEvent::Token { content: "partial".into() })
            .await
            .unwrap();
        drop(agent_tx);

        relay(agent_rx, out_tx).await;

        assert_eq!(out_rx.recv().await.unwrap().event, "token");
        let last = out_rx.recv().await.unwrap();
        assert_eq!(last, ClientEvent::error("INTERNAL_SERVER_ERROR"));
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn relay_forwards_internal_error_once() {
        let (agent_tx, agent_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        agent_tx.send(AgentEvent::internal_error("boom")).await.unwrap();
        drop(agent_tx);

        relay(agent_rx, out_tx).await;

        let event = out_rx.recv().await.unwrap();
        assert_eq!(event.event, "error");
        assert_eq!(event.data["detail"], "INTERNAL_SERVER_ERROR");
        assert!(out_rx.recv().await.is_none());
    }
}
