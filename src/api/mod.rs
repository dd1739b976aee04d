//! FMIACP REST API
//!
//! HTTP API layer, built with Axum.
//!
//! # Endpoints
//!
//! Every route requires Basic auth. Routes under `/api` are also bounded
//! by the request timeout.
//!
//! - `POST /api/createFMIACP` - Ingest one event
//! - `GET /api/getFMIACP` - Full log
//! - `GET /api/getFMIACPCurrent` - Latest state per (machine, type)
//! - `GET /api/getAppStatusFMIACP` - Counters and connection state
//!
//! ## Health
//! - `GET /health/live` - Liveness check
//! - `GET /health/ready` - Readiness check
//!
//! # Example
//!
//! ```rust,ignore
//! use fmiacp::api::{serve, ApiConfig, AppState};
//! use fmiacp::cache::{CacheEngine, ReloadCoordinator};
//! use fmiacp::store::SqliteConnector;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(CacheEngine::new(Arc::new(SqliteConnector::new("fmiacp.db"))));
//!     let coordinator = Arc::new(ReloadCoordinator::new(Arc::clone(&engine)));
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(engine, coordinator, config.clone(), vec![]);
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;

    // Create shared state
    let shared_state = Arc::new(state);

    let api_routes = Router::new()
        .route("/createFMIACP", post(routes::ingest::create))
        .route("/getFMIACP", get(routes::records::get_all))
        .route("/getFMIACPCurrent", get(routes::records::get_current))
        .route("/getAppStatusFMIACP", get(routes::status::get_status))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&shared_state),
            enforce_timeout,
        ))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&shared_state),
            auth::require_basic_auth,
        ))
        .layer(DefaultBodyLimit::max(max_body_size));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&shared_state),
            auth::require_basic_auth,
        ));

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Answer 504 when a handler overruns the configured request timeout.
///
/// Work the handler spawned (reloads, upserts) keeps running.
async fn enforce_timeout(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let limit = state.config.request_timeout();
    let path = request.uri().path().to_string();

    tokio::time::timeout(limit, next.run(request))
        .await
        .map_err(|_| {
            tracing::warn!(path = %path, timeout_ms = limit.as_millis() as u64, "Request timed out");
            ApiError::Timeout(limit)
        })
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("FMIACP API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("FMIACP API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEngine, ReloadCoordinator};
    use crate::config::Credential;
    use crate::store::testing::ScriptedStore;
    use crate::store::NewRecord;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use base64::{engine::general_purpose::STANDARD, Engine};
    use chrono::{FixedOffset, TimeZone};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    struct TestApp {
        router: Router,
        store: ScriptedStore,
        engine: Arc<CacheEngine>,
    }

    fn create_test_app(store: ScriptedStore, config: ApiConfig) -> TestApp {
        let engine = Arc::new(CacheEngine::new(store.connector()));
        let coordinator = Arc::new(ReloadCoordinator::new(Arc::clone(&engine)));
        let credentials = vec![Credential::new("dashboard", "secret")];

        let state = AppState::new(Arc::clone(&engine), coordinator, config, credentials);
        TestApp {
            router: build_router(state),
            store,
            engine,
        }
    }

    fn seeded_app() -> TestApp {
        let store = ScriptedStore::new();
        let utc = FixedOffset::east_opt(0).unwrap();
        store.seed(
            NewRecord::new("M1", "PARKING_BRAKE")
                .start_time(utc.timestamp_opt(100, 0).unwrap())
                .value("0"),
        );
        store.seed(
            NewRecord::new("M1", "PARKING_BRAKE")
                .start_time(utc.timestamp_opt(200, 0).unwrap())
                .value("1"),
        );
        store.seed(
            NewRecord::new("M2", "COLLISION_ZONE")
                .start_time(utc.timestamp_opt(150, 0).unwrap())
                .value("1"),
        );
        create_test_app(store, ApiConfig::default())
    }

    fn basic(user: &str, passwd: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{passwd}")))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, basic("dashboard", "secret"))
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, basic("dashboard", "secret"))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = seeded_app();

        let (status, _) = send(&app, get("/health/live")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready_follows_connection() {
        let app = seeded_app();

        let (status, _) = send(&app, get("/health/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        send(&app, get("/api/getFMIACP")).await;
        let (status, _) = send(&app, get("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_requires_credentials() {
        let app = seeded_app();
        send(&app, get("/api/getFMIACP")).await;

        for uri in ["/health/live", "/health/ready"] {
            let response = app
                .router
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(
                response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
                r#"Basic realm="fmiacp""#
            );
        }
    }

    #[tokio::test]
    async fn test_no_configured_users_rejects_everything() {
        let engine = Arc::new(CacheEngine::new(ScriptedStore::new().connector()));
        let coordinator = Arc::new(ReloadCoordinator::new(Arc::clone(&engine)));
        let state = AppState::new(engine, coordinator, ApiConfig::default(), vec![]);
        let router = build_router(state);

        for uri in ["/health/ready", "/api/getFMIACP"] {
            let response = router
                .clone()
                .oneshot(get(uri))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let app = seeded_app();

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/getFMIACP")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            r#"Basic realm="fmiacp""#
        );
        // Never reached the cache
        assert_eq!(app.store.query_count(), 0);
        assert_eq!(app.engine.counters().snapshot().output_requests, 0);
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let app = seeded_app();

        let request = Request::builder()
            .method("POST")
            .uri("/api/createFMIACP")
            .header(header::AUTHORIZATION, basic("dashboard", "wrong"))
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"MACHINE_NAME": "M1", "TYPE": "T"}"#))
            .unwrap();
        let (status, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.store.row_count(), 3);
        assert_eq!(app.engine.counters().snapshot().input_requests, 0);
    }

    #[tokio::test]
    async fn test_get_all_returns_full_log() {
        let app = seeded_app();

        let (status, body) = send(&app, get("/api/getFMIACP")).await;
        assert_eq!(status, StatusCode::OK);

        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 3);
        let ids: Vec<_> = records.iter().map(|r| r["ID"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(records[0]["MACHINE_NAME"], "M2");

        let counters = app.engine.counters().snapshot();
        assert_eq!(counters.output_requests, 1);
        assert_eq!(counters.output, 3);
    }

    #[tokio::test]
    async fn test_get_current_one_per_key() {
        let app = seeded_app();

        let (status, body) = send(&app, get("/api/getFMIACPCurrent")).await;
        assert_eq!(status, StatusCode::OK);

        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 2);
        let brake = records
            .iter()
            .find(|r| r["MACHINE_NAME"] == "M1" && r["TYPE"] == "PARKING_BRAKE")
            .unwrap();
        assert_eq!(brake["VALUE"], "1");
    }

    #[tokio::test]
    async fn test_read_filters() {
        let app = seeded_app();

        let (_, body) = send(&app, get("/api/getFMIACP?MACHINE_NAME=M1&limit=1")).await;
        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["ID"], 2);

        let (_, body) = send(&app, get("/api/getFMIACPCurrent?TYPE=COLLISION_ZONE")).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        // Output counter counts what was returned
        assert_eq!(app.engine.counters().snapshot().output, 2);
    }

    #[tokio::test]
    async fn test_read_with_store_down_is_unavailable() {
        let store = ScriptedStore::new();
        store.set_fail_connect(true);
        let app = create_test_app(store, ApiConfig::default());

        let (status, body) = send(&app, get("/api/getFMIACP")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

        let (status, _) = send(&app, get("/api/getFMIACPCurrent")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_read_after_query_failure_is_empty() {
        let app = seeded_app();
        send(&app, get("/api/getFMIACP")).await;

        app.store.set_fail_query(true);
        let (status, body) = send(&app, get("/api/getFMIACP")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_create_stores_record() {
        let app = create_test_app(ScriptedStore::new(), ApiConfig::default());

        let (status, body) = send(
            &app,
            post_json(
                "/api/createFMIACP",
                json!({
                    "MACHINE_NAME": "M1",
                    "START_TIME": "2024-03-01T08:00:00Z",
                    "CATEGORY": "ACP",
                    "TYPE": "PARKING_BRAKE",
                    "MEASUREMENT": "STATE",
                    "VALUE": "0"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(true));
        assert_eq!(app.store.row_count(), 1);

        let counters = app.engine.counters().snapshot();
        assert_eq!(counters.input_requests, 1);
        assert_eq!(counters.input, 1);
        assert_eq!(counters.store_success, 1);
    }

    #[tokio::test]
    async fn test_latest_wins_even_when_store_rejects_writes() {
        let store = ScriptedStore::new();
        store.set_fail_merge(true);
        let app = create_test_app(store, ApiConfig::default());

        for (start, value) in [("2024-03-01T08:00:00Z", "0"), ("2024-03-01T09:00:00Z", "1")] {
            let (status, body) = send(
                &app,
                post_json(
                    "/api/createFMIACP",
                    json!({
                        "MACHINE_NAME": "M1",
                        "TYPE": "PARKING_BRAKE",
                        "START_TIME": start,
                        "VALUE": value
                    }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!(false));
        }

        let latest = app.engine.get_latest().await;
        let entry = latest
            .get(&crate::store::RecordKey::new("M1", "PARKING_BRAKE"))
            .unwrap();
        assert_eq!(entry.value.as_deref(), Some("1"));
        assert_eq!(app.engine.counters().snapshot().store_failure, 2);
    }

    #[tokio::test]
    async fn test_create_validation_errors() {
        let app = create_test_app(ScriptedStore::new(), ApiConfig::default());

        let (status, body) = send(
            &app,
            post_json("/api/createFMIACP", json!({"MACHINE_NAME": "M1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let request = Request::builder()
            .method("POST")
            .uri("/api/createFMIACP")
            .header(header::AUTHORIZATION, basic("dashboard", "secret"))
            .header("Content-Type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let counters = app.engine.counters().snapshot();
        assert_eq!(counters.input_requests, 2);
        assert_eq!(counters.input, 0);
        assert_eq!(app.store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_status_reports_counters() {
        let app = seeded_app();
        send(&app, get("/api/getFMIACP")).await;
        let queries_before = app.store.query_count();

        let (status, body) = send(&app, get("/api/getAppStatusFMIACP")).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(body["Name"], "FMIACP");
        assert_eq!(body["Version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["DataStoreSize"], 3);
        assert_eq!(body["LatestStateSize"], 2);
        assert_eq!(body["DataOutputRequestCount"], 1);
        assert_eq!(body["DataOutputCount"], 3);
        assert_eq!(body["DatabaseConnection"], "Connected");
        assert!(body["UsageMemory"].is_object());
        assert!(body["UsageCPU"].is_object());
        assert!(body["LastReload"].is_string());

        // Status never reloads
        assert_eq!(app.store.query_count(), queries_before);
    }

    #[tokio::test]
    async fn test_status_before_any_connection() {
        let app = create_test_app(ScriptedStore::new(), ApiConfig::default());

        let (status, body) = send(&app, get("/api/getAppStatusFMIACP")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["DatabaseConnection"], "Disconnected");
        assert_eq!(body["LastReload"], Value::Null);
    }

    #[tokio::test]
    async fn test_slow_reload_times_out() {
        let store = ScriptedStore::new();
        store.hold_queries(true);
        let config = ApiConfig {
            request_timeout_ms: 50,
            ..Default::default()
        };
        let app = create_test_app(store, config);

        let (status, body) = send(&app, get("/api/getFMIACP")).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["code"], "TIMEOUT");

        // The reload is still running; a second read does not wait on it
        let (status, body) = send(&app, get("/api/getFMIACP")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        app.store.release_query();
    }
}
