//! Dashboard gateway.
//!
//! Thin HTTP layer over the bridge core, built with Axum. It renders state
//! snapshots and forwards device commands; no bridge logic lives here.
//!
//! # Endpoints
//!
//! - `GET /` - dashboard page with the current state table
//! - `GET /events` - SSE stream, one re-rendered table per state change
//! - `GET /api/state` - JSON snapshot of all topics
//! - `GET /api/status` - broker link status and counters
//! - `POST /api/command` - publish an arbitrary topic/payload pair
//! - `POST /api/settings` - send a "change setting" command to the device
//! - `POST /api/settings/request` - ask the device to re-emit its settings

pub mod error;
pub mod render;
pub mod routes;

pub use error::{ApiError, ApiResult};

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::broker::BrokerLink;
use crate::bus::ChangeBus;
use crate::config::HttpConfig;
use crate::state::StateStore;

/// Everything a request handler needs, injected at router build time.
pub struct AppState {
    pub store: Arc<StateStore>,
    pub bus: ChangeBus,
    pub link: BrokerLink,
}

/// Builds the dashboard router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/", get(routes::dashboard))
        .route("/events", get(routes::event_stream))
        .route("/api/state", get(routes::current_state))
        .route("/api/status", get(routes::link_status))
        .route("/api/command", post(routes::publish_command))
        .route("/api/settings", post(routes::change_setting))
        .route("/api/settings/request", post(routes::request_settings))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Serves the dashboard until ctrl-c or SIGTERM.
pub async fn serve(state: AppState, config: &HttpConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("dashboard listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("dashboard shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio_util::sync::CancellationToken;
    use tower::util::ServiceExt;

    async fn test_app() -> (Router, Arc<StateStore>, CancellationToken) {
        let store = Arc::new(StateStore::new());
        let bus = ChangeBus::new();
        let shutdown = CancellationToken::new();
        let config = BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..BrokerConfig::default()
        };
        let (link, _handle) =
            BrokerLink::spawn(config, Arc::clone(&store), bus.clone(), shutdown.clone());
        let state = AppState {
            store: Arc::clone(&store),
            bus,
            link,
        };
        (build_router(state), store, shutdown)
    }

    #[tokio::test]
    async fn dashboard_page_renders() {
        let (app, store, shutdown) = test_app().await;
        store.ingest("esp32/temperature", "23.4").await;

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let page = String::from_utf8(body.to_vec()).unwrap();
        assert!(page.contains("esp32/temperature"));
        assert!(page.contains("23.4"));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn state_endpoint_returns_the_snapshot() {
        let (app, store, shutdown) = test_app().await;
        store.ingest("status", "running").await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/state")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "running");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn status_endpoint_reports_a_down_link() {
        let (app, _store, shutdown) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["connected"], false);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn commands_fail_explicitly_while_the_link_is_down() {
        let (app, _store, shutdown) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/command")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"topic":"settings","payload":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "BROKER_DOWN");
        shutdown.cancel();
    }

    #[tokio::test]
    async fn setting_change_fails_explicitly_while_the_link_is_down() {
        let (app, _store, shutdown) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/settings")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"name":"pump_interval","value":"30"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        shutdown.cancel();
    }
}
