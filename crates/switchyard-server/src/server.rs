//! `SwitchyardServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use switchyard_core::ConnectionId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::topics::registry::TopicRegistry;
use crate::websocket::connection::ClientConnection;
use crate::websocket::dispatcher::Dispatcher;
use crate::websocket::handshake::{Handshake, resolve_handshake};
use crate::websocket::outbound::Outbound;
use crate::websocket::registry::SessionRegistry;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Frame router and lifecycle tracker.
    pub dispatcher: Arc<Dispatcher>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle.
    pub metrics_handle: PrometheusHandle,
}

/// The switchyard server.
pub struct SwitchyardServer {
    config: Arc<ServerConfig>,
    dispatcher: Arc<Dispatcher>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics_handle: PrometheusHandle,
}

impl SwitchyardServer {
    /// Create a server over a populated topic registry.
    pub fn new(config: ServerConfig, topics: TopicRegistry, metrics_handle: PrometheusHandle) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(topics), Arc::new(SessionRegistry::new()))
            .with_close_superseded(config.close_superseded);
        Self::with_dispatcher(config, dispatcher, metrics_handle)
    }

    /// Create a server around a preconfigured dispatcher.
    pub fn with_dispatcher(
        config: ServerConfig,
        dispatcher: Dispatcher,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics_handle,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            dispatcher: Arc::clone(&self.dispatcher),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            metrics_handle: self.metrics_handle.clone(),
        };

        Router::new()
            .route(&self.config.endpoint_path, get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the server task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(
            %local_addr,
            endpoint = %self.config.endpoint_path,
            topics = self.dispatcher.topics().len(),
            "switchyard server started"
        );

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server terminated with error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Dispatcher shared by every connection.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Outbound API for pushing to clients from outside the dispatch loop.
    pub fn outbound(&self) -> Outbound {
        self.dispatcher.outbound()
    }

    /// Session registry.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        self.dispatcher.sessions()
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET {endpoint}: WebSocket upgrade.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<Vec<(String, String)>>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let handshake = resolve_handshake(&params);
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, handshake, state))
}

async fn handle_socket(socket: WebSocket, handshake: Handshake, state: AppState) {
    let (tx, rx) = mpsc::channel(state.config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(
        ConnectionId::generate(),
        tx,
        handshake.attributes,
    ));
    run_ws_session(
        socket,
        connection,
        rx,
        state.dispatcher,
        state.config.heartbeat(),
        state.shutdown.token(),
    )
    .await;
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let resp = health::health_check(
        state.start_time,
        state.dispatcher.active_connections(),
        state.dispatcher.sessions().identified_count(),
        state.dispatcher.topics().len(),
    );
    Json(resp)
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics_handle)
}
