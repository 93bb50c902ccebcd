//! HTTP command surface.
//!
//! - `POST /command` - run one [`Command`] and return its [`Response`]
//! - `GET /health` - liveness, watch count and uptime
//!
//! Handlers never touch the engine directly: they validate the request and
//! forward it through a [`KeeperHandle`] to the dispatcher.
//!
//! # Example
//!
//! ```rust,no_run
//! use tabkeeper::routes::{create_router, AppState};
//! # fn handle() -> tabkeeper::service::KeeperHandle { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = create_router(AppState::new(handle()));
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:7878").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::commands::{Command, Response};
use crate::error::KeeperError;
use crate::service::KeeperHandle;

/// Maximum request body size (64 KB).
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Shared state for all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Sender to the dispatcher.
    pub handle: KeeperHandle,

    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(handle: KeeperHandle) -> Self {
        Self {
            handle,
            start_time: Instant::now(),
        }
    }
}

/// Creates the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/command", post(post_command))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .route("/health", get(get_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
        }
    }

    fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

fn error_response(status: StatusCode, body: ErrorResponse) -> HttpResponse {
    (status, Json(body)).into_response()
}

/// POST /command - run a command.
///
/// # Responses
///
/// - `200 OK` - the command's response
/// - `400 Bad Request` - malformed JSON, unknown action, or invalid payload
/// - `500 Internal Server Error` - the store failed
/// - `503 Service Unavailable` - the dispatcher has stopped
async fn post_command(State(state): State<AppState>, body: Bytes) -> HttpResponse {
    let command: Command = match serde_json::from_slice(&body) {
        Ok(command) => command,
        Err(err) => {
            debug!(error = %err, "Rejected malformed command");
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(format!("invalid command: {err}")).with_code("invalid_command"),
            );
        }
    };

    if let Err(err) = command.validate() {
        debug!(action = command.action(), error = %err, "Rejected invalid command");
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorResponse::new(err.to_string()).with_code(err.code()),
        );
    }

    let action = command.action();
    match state.handle.send(command).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(KeeperError::Shutdown) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorResponse::new("keeper is shutting down").with_code("shutdown"),
        ),
        Err(err) => {
            error!(action, error = %err, "Command failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(err.to_string()).with_code("internal_error"),
            )
        }
    }
}

/// Health check response body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub watches: usize,
    pub uptime_seconds: u64,
}

/// GET /health - report status, watch count and uptime.
async fn get_health(State(state): State<AppState>) -> HttpResponse {
    let uptime_seconds = state.start_time.elapsed().as_secs();

    match state.handle.send(Command::GetWatches).await {
        Ok(Response::Watches(watches)) => Json(HealthResponse {
            status: "ok".to_string(),
            watches: watches.len(),
            uptime_seconds,
        })
        .into_response(),
        Ok(_) | Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable".to_string(),
                watches: 0,
                uptime_seconds,
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use crate::keeper::Keeper;
    use crate::service;
    use crate::store::{KvStore, MemoryStore};
    use crate::tabs::MemoryTabs;
    use crate::timers::TimerBinding;

    async fn test_app() -> Router {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        crate::store::install(store.as_ref()).await.unwrap();
        let (fire_tx, fire_rx) = mpsc::channel(service::FIRE_CHANNEL_CAPACITY);
        let timers = TimerBinding::new(fire_tx, Duration::from_secs(60));
        let keeper = Keeper::new(store, Arc::new(MemoryTabs::new()), timers, 300);
        let (handle, _task) = service::spawn(keeper, fire_rx);
        create_router(AppState::new(handle))
    }

    async fn post_json(app: Router, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/command")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn add_request(interval: u32) -> Value {
        json!({
            "action": "addWatch",
            "watch": {
                "id": "w-1",
                "url": "https://example.com",
                "tabId": 42,
                "title": "Example",
                "intervalMinutes": interval
            }
        })
    }

    #[tokio::test]
    async fn health_returns_ok_status() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.watches, 0);
    }

    #[tokio::test]
    async fn add_then_get_watches() {
        let app = test_app().await;

        let (status, body) = post_json(app.clone(), add_request(5)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));

        let (status, body) = post_json(app, json!({"action": "getWatches"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["w-1"]["url"], "https://example.com");
        assert_eq!(body["w-1"]["refreshCount"], 0);
        assert!(body["w-1"]["lastAttempt"].is_null());
    }

    #[tokio::test]
    async fn get_history_starts_empty() {
        let app = test_app().await;
        let (status, body) = post_json(app, json!({"action": "getHistory"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn rejects_out_of_range_interval() {
        let app = test_app().await;
        let (status, body) = post_json(app.clone(), add_request(0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_interval");

        let (_, body) = post_json(app, json!({"action": "getWatches"})).await;
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn rejects_blank_url() {
        let app = test_app().await;
        let mut request = add_request(5);
        request["watch"]["url"] = json!("   ");

        let (status, body) = post_json(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "empty_url");
    }

    #[tokio::test]
    async fn rejects_unknown_action() {
        let app = test_app().await;
        let (status, body) = post_json(app, json!({"action": "lockWatch", "id": "w-1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_command");
    }

    #[tokio::test]
    async fn rejects_invalid_json() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/command")
                    .header("Content-Type", "application/json")
                    .body(Body::from("not valid json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn remove_unknown_watch_still_succeeds() {
        let app = test_app().await;
        let (status, body) =
            post_json(app, json!({"action": "removeWatch", "id": "missing"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
    }

    #[test]
    fn error_response_serializes_without_code() {
        let json = serde_json::to_string(&ErrorResponse::new("boom")).unwrap();
        assert_eq!(json, r#"{"error":"boom"}"#);
    }
}
