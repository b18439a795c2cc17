//! Sensorcast HTTP API
//!
//! HTTP API layer for Sensorcast, built with Axum.
//!
//! # Endpoints
//!
//! ## Readings
//! - `POST /api/readings` - Ingest a reading
//! - `GET /api/readings?limit=N` - Recent readings, newest first
//! - `GET /api/readings/latest` - Most recent reading
//! - `GET /api/readings/:id` - Single reading
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /ws` - Live reading stream
//! - `GET /` - Live reading stream for upgrade requests, otherwise static
//!
//! Any other path falls through to the static directory, when one is configured.
//!
//! # Example
//!
//! ```rust,ignore
//! use sensorcast::alert::AlertNotifier;
//! use sensorcast::api::{serve, ApiConfig, AppState};
//! use sensorcast::storage::{ReadingStore, StoreConfig};
//! use sensorcast::websocket::HubConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ReadingStore::open(&StoreConfig::new("./data"))?;
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::start(store, HubConfig::default(), AlertNotifier::disabled(30.0), config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::websocket::{root_handler, websocket_handler};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let reading_routes = Router::new()
        .route(
            "/readings",
            get(routes::readings::list_readings).post(routes::readings::create_reading),
        )
        .route("/readings/latest", get(routes::readings::latest_reading))
        .route("/readings/:id", get(routes::readings::get_reading));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let mut router = Router::new()
        .nest("/api", reading_routes)
        .nest("/health", health_routes)
        .route("/ws", get(websocket_handler))
        .route("/", get(root_handler));

    if let Some(dir) = &state.config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    // Create shared state
    let shared_state = Arc::new(state);

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Sensorcast listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Sensorcast shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
    use crate::alert::testing::RecordingChannel;
    use crate::alert::AlertNotifier;
    use crate::storage::{Reading, ReadingStore, StoreConfig};
    use crate::websocket::testing::{http_get, serve_local, wait_for_subscribers, RawClient};
    use crate::websocket::{BroadcastHub, HubConfig, ServerMessage, Subscription};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tower::util::ServiceExt;

    struct TestApp {
        router: Router,
        store: ReadingStore,
        hub: Arc<BroadcastHub>,
        alerts: mpsc::UnboundedReceiver<String>,
    }

    fn create_test_app_with(channel: RecordingChannel, alerts: mpsc::UnboundedReceiver<String>) -> TestApp {
        create_test_app_on(ReadingStore::in_memory().unwrap(), channel, alerts)
    }

    fn create_test_app_on(
        store: ReadingStore,
        channel: RecordingChannel,
        alerts: mpsc::UnboundedReceiver<String>,
    ) -> TestApp {
        let notifier = AlertNotifier::new(30.0, Some(Arc::new(channel)));
        let state = AppState::start(
            store.clone(),
            HubConfig::default(),
            notifier,
            ApiConfig::default(),
        );
        let hub = Arc::clone(&state.hub);

        TestApp {
            router: build_router(state),
            store,
            hub,
            alerts,
        }
    }

    fn create_test_app() -> TestApp {
        let (channel, alerts) = RecordingChannel::new();
        create_test_app_with(channel, alerts)
    }

    async fn get(app: &TestApp, uri: &str) -> Response {
        app.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_json(app: &TestApp, body: &str) -> Response {
        app.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/readings")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn subscribe(app: &TestApp) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = app.hub.subscriber_queue();
        let mut subscription = Subscription::connecting();
        app.hub.join(&mut subscription, tx).await.unwrap();
        rx
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app();
        let response = get(&app, "/health/live").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let app = create_test_app();
        let response = get(&app, "/health/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let app = create_test_app();
        post_json(&app, r#"{"temperature": 20.0, "humidity": 40.0}"#).await;

        let response = get(&app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["readings"], 1);
        assert_eq!(body["subscribers"], 0);
    }

    #[tokio::test]
    async fn test_ingest_hot_reading_broadcasts_and_alerts() {
        let mut app = create_test_app();
        let mut subscriber = subscribe(&app).await;

        let response = post_json(&app, r#"{"temperature": 31.5, "humidity": 60.2}"#).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let reading: Reading = body_json(response).await;
        assert_eq!(reading.id, 1);
        assert_eq!(reading.temperature, 31.5);
        assert_eq!(reading.humidity, 60.2);
        assert!(reading.created_at_utc().is_some());

        let msg = timeout(Duration::from_secs(2), subscriber.recv())
            .await
            .unwrap();
        assert_eq!(msg, Some(ServerMessage::NewReading(reading)));

        let alert = timeout(Duration::from_secs(2), app.alerts.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(alert.contains("31.5°C"));
    }

    #[tokio::test]
    async fn test_ingest_non_numeric_is_rejected_without_side_effects() {
        let mut app = create_test_app();
        let mut subscriber = subscribe(&app).await;

        let response = post_json(&app, r#"{"temperature": "hot"}"#).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(app.store.count().await.unwrap(), 0);
        assert!(subscriber.try_recv().is_err());
        assert!(app.alerts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ingest_missing_field_is_rejected() {
        let app = create_test_app();
        let response = post_json(&app, r#"{"temperature": 22.0}"#).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_invalid_json() {
        let app = create_test_app();
        let response = post_json(&app, "not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_at_threshold_does_not_alert() {
        let mut app = create_test_app();

        let response = post_json(&app, r#"{"temperature": 30.0, "humidity": 50.0}"#).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(app.alerts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_alert_failure_does_not_affect_response() {
        let (channel, alerts) = RecordingChannel::failing();
        let mut app = create_test_app_with(channel, alerts);

        let response = post_json(&app, r#"{"temperature": 35.0, "humidity": 20.0}"#).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        // The attempt was made and failed
        assert!(timeout(Duration::from_secs(2), app.alerts.recv())
            .await
            .unwrap()
            .is_some());
        assert_eq!(app.store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_empty_is_not_found() {
        let app = create_test_app();
        let response = get(&app, "/api/readings/latest").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_latest_and_history() {
        let app = create_test_app();
        for i in 0..5 {
            let body = format!(r#"{{"temperature": {}, "humidity": 50}}"#, 20 + i);
            let response = post_json(&app, &body).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = get(&app, "/api/readings/latest").await;
        assert_eq!(response.status(), StatusCode::OK);
        let latest: Reading = body_json(response).await;
        assert_eq!(latest.id, 5);
        assert_eq!(latest.temperature, 24.0);

        let response = get(&app, "/api/readings?limit=3").await;
        assert_eq!(response.status(), StatusCode::OK);
        let history: Vec<Reading> = body_json(response).await;
        assert_eq!(
            history.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![5, 4, 3]
        );

        let response = get(&app, "/api/readings?limit=abc").await;
        let history: Vec<Reading> = body_json(response).await;
        assert_eq!(history.len(), 5);
    }

    #[tokio::test]
    async fn test_get_reading_by_id() {
        let app = create_test_app();
        post_json(&app, r#"{"temperature": 19.0, "humidity": 70.0}"#).await;

        let response = get(&app, "/api/readings/1").await;
        assert_eq!(response.status(), StatusCode::OK);
        let reading: Reading = body_json(response).await;
        assert_eq!(reading.humidity, 70.0);

        let response = get(&app, "/api/readings/42").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_bootstrap() {
        let app = create_test_app();
        let response = post_json(&app, r#"{"temperature": 26.0, "humidity": 44.0}"#).await;
        let reading: Reading = body_json(response).await;

        // Let the fan-out drain before joining
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut subscriber = subscribe(&app).await;
        assert_eq!(
            subscriber.try_recv().unwrap(),
            ServerMessage::LatestReading(reading)
        );
        assert!(subscriber.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_storage_failure_is_500_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let store_config = StoreConfig::new(dir.path());
        let store = ReadingStore::open(&store_config).unwrap();
        let (channel, alerts) = RecordingChannel::new();
        let mut app = create_test_app_on(store, channel, alerts);
        let mut subscriber = subscribe(&app).await;

        // Break the table underneath the store
        let conn = rusqlite::Connection::open(store_config.db_path()).unwrap();
        conn.execute_batch("DROP TABLE readings;").unwrap();

        let response = post_json(&app, r#"{"temperature": 45.0, "humidity": 10.0}"#).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["error"]["code"], "STORAGE_ERROR");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(subscriber.try_recv().is_err());
        assert!(app.alerts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_integer_id_is_validation_error() {
        let app = create_test_app();
        let response = get(&app, "/api/readings/abc").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_root_without_static_dir_is_not_found() {
        let app = create_test_app();
        let response = get(&app, "/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_root_upgrades_and_serves_dashboard() {
        let public = tempfile::tempdir().unwrap();
        std::fs::write(public.path().join("index.html"), "<h1>dashboard</h1>").unwrap();
        std::fs::write(public.path().join("script.js"), "// live").unwrap();

        let config = ApiConfig {
            static_dir: Some(public.path().to_string_lossy().into_owned()),
            ..ApiConfig::default()
        };
        let state = AppState::start(
            ReadingStore::in_memory().unwrap(),
            HubConfig::default(),
            AlertNotifier::disabled(30.0),
            config,
        );
        let hub = Arc::clone(&state.hub);
        let ingestor = Arc::clone(&state.ingestor);
        let addr = serve_local(build_router(state)).await;

        let (head, mut client) = RawClient::connect(addr, "/").await;
        assert!(head.starts_with("HTTP/1.1 101"), "{}", head);
        wait_for_subscribers(&hub, 1).await;

        let reading = ingestor.ingest(24.0, 51.0).await.unwrap();
        let msg = client.next_json().await;
        assert_eq!(msg["type"], "new-reading");
        assert_eq!(msg["data"]["id"], reading.id);

        let page = http_get(addr, "/").await;
        assert!(page.starts_with("HTTP/1.1 200"), "{}", page);
        assert!(page.contains("<h1>dashboard</h1>"));

        let script = http_get(addr, "/script.js").await;
        assert!(script.starts_with("HTTP/1.1 200"), "{}", script);
    }
}
