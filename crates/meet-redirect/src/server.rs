use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};

use crate::browser::{BridgeHost, BrowserBridge};
use crate::config::RedirectConfig;
use crate::error::{CoreError, CoreResult};
use crate::service::{RedirectHandle, RedirectService, ServiceSnapshot};
use crate::storage::KvStore;

pub mod extension;

/// Local HTTP/WebSocket endpoint the companion browser extension connects to.
pub struct Server {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: RedirectHandle,
}

pub(crate) struct ServerState {
    pub(crate) browser: Arc<BrowserBridge>,
    pub(crate) redirect: RedirectHandle,
}

impl Server {
    /// Binds `config.server.bind`, wires the bridge into a fresh redirect
    /// service and starts serving in the background.
    pub async fn start(config: RedirectConfig, kv: Box<dyn KvStore>) -> CoreResult<Self> {
        let bind = config.server.bind_addr()?;
        let browser = Arc::new(BrowserBridge::new(config.server.command_timeout()));
        let host = Arc::new(BridgeHost::new(browser.clone()));
        let handle = RedirectService::spawn(host, config, kv);
        let state = Arc::new(ServerState {
            browser,
            redirect: handle.clone(),
        });

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        let app = Router::new()
            .route("/health", get(health))
            .route("/status", get(status))
            .route("/extension/ws", get(extension::ws_handler))
            .route("/extension/status", get(extension::status))
            .with_state(state)
            .layer(cors);

        let listener = TcpListener::bind(bind)
            .await
            .map_err(|error| CoreError::Internal(format!("failed to bind {bind}: {error}")))?;
        let addr = listener
            .local_addr()
            .map_err(|error| CoreError::Internal(error.to_string()))?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(error) = result {
                tracing::warn!("server stopped with error: {error}");
            }
        });
        tracing::info!("listening on {addr}");

        Ok(Server {
            addr,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn handle(&self) -> &RedirectHandle {
        &self.handle
    }

    pub fn shutdown(&mut self) -> CoreResult<()> {
        if let Some(sender) = self.shutdown.take() {
            sender
                .send(())
                .map_err(|_| CoreError::Internal("failed to send server shutdown signal".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn status(
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> Result<Json<ServiceSnapshot>, (axum::http::StatusCode, String)> {
    state
        .redirect
        .snapshot()
        .await
        .map(Json)
        .map_err(|error| (axum::http::StatusCode::SERVICE_UNAVAILABLE, error.to_string()))
}
