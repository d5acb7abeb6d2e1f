//! `StreamServer`: router, listener and background tasks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::{Json, Response};
use axum::routing::get;
use axum_extra::extract::cookie::CookieJar;
use metrics_exporter_prometheus::PrometheusHandle;
use simstream_core::{DatasetSource, SessionId};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::manifest::{SESSION_COOKIE, manifest_handler};
use crate::registry::{SessionRegistry, start_expiry_task};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{StreamContext, serve_connection};

/// Shared state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session registry.
    pub registry: Arc<SessionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
}

/// The frame streaming server.
pub struct StreamServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: PrometheusHandle,
}

impl StreamServer {
    /// Create a server streaming datasets from `source`.
    pub fn new(
        config: ServerConfig,
        source: Arc<dyn DatasetSource>,
        metrics: PrometheusHandle,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(source, config.loader_workers));
        Self {
            config: Arc::new(config),
            registry,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/sim/pos", get(stream_by_cookie))
            .route("/sim/{key}", get(manifest_handler))
            .route("/sim/{key}/pos", get(stream_by_path))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind and serve until shutdown is triggered.
    ///
    /// Returns the bound address and the handles of the listener and the
    /// session expiry sweeper.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, Vec<JoinHandle<()>>)> {
        let bind = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&bind).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "stream server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });

        let sweeper = start_expiry_task(
            Arc::clone(&self.registry),
            self.config.sweep_interval,
            self.config.session_expiry,
            self.shutdown.token(),
        );

        Ok((addr, vec![server, sweeper]))
    }
}

fn stream_context(state: &AppState) -> StreamContext {
    StreamContext {
        registry: Arc::clone(&state.registry),
        keepalive_ttl: state.config.keepalive_ttl,
        shutdown: state.shutdown.token(),
    }
}

async fn stream_by_path(
    ws: WebSocketUpgrade,
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, Some(SessionId::from_raw(key)), &state)
}

async fn stream_by_cookie(
    ws: WebSocketUpgrade,
    jar: CookieJar,
    State(state): State<AppState>,
) -> Response {
    let id = jar
        .get(SESSION_COOKIE)
        .map(|c| SessionId::from_raw(c.value()));
    upgrade(ws, id, &state)
}

fn upgrade(ws: WebSocketUpgrade, id: Option<SessionId>, state: &AppState) -> Response {
    let ctx = stream_context(state);
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| serve_connection(socket, id, ctx))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.shutdown.is_shutting_down(),
        state.registry.len(),
        state.registry.attached_count(),
    ))
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use simstream_core::SyntheticSource;
    use tower::ServiceExt;

    use super::*;

    fn server() -> StreamServer {
        StreamServer::new(
            ServerConfig::default(),
            Arc::new(SyntheticSource::with_test_dataset()),
            PrometheusBuilder::new().build_recorder().handle(),
        )
    }

    async fn fetch(router: Router, uri: &str) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let resp = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec(), headers)
    }

    #[tokio::test]
    async fn health_reports_sessions() {
        let srv = server();
        let _ = srv.registry().create("test").await.unwrap();
        let (status, body, _) = fetch(srv.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessions"], 1);
        assert_eq!(json["attached_sessions"], 0);
    }

    #[tokio::test]
    async fn manifest_creates_session_and_sets_cookie() {
        let srv = server();
        let (status, body, headers) = fetch(srv.router(), "/sim/test").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let id = json["id"].as_str().unwrap().to_string();
        assert!(srv.registry().contains(&SessionId::from_raw(id.as_str())));
        assert_eq!(json["frame_number"], 10);
        assert!(json["ws_url"].as_str().unwrap().ends_with(&format!("/sim/{id}/pos")));

        let cookie = headers
            .get(axum::http::header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with(&format!("key={id}")));
    }

    #[tokio::test]
    async fn manifest_unknown_dataset_is_404() {
        let srv = server();
        let (status, body, _) = fetch(srv.router(), "/sim/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, b"Could not find dataset missing");
        assert!(srv.registry().is_empty());
    }

    #[tokio::test]
    async fn metrics_endpoint_responds() {
        let srv = server();
        let (status, _, _) = fetch(srv.router(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn listen_binds_and_shuts_down() {
        let srv = server();
        let (addr, handles) = srv.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        srv.shutdown()
            .drain(handles, Some(std::time::Duration::from_secs(5)))
            .await;
    }
}
