//! HTTP listener for market events
//!
//! Accepts `POST` on a single configured path and forwards each envelope to
//! the event bus before acknowledging it.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::bus::EventBus;
use super::protocol::Envelope;
use crate::config::WebhookConfig;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Listening,
}

struct Running {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<std::io::Result<()>>,
}

pub struct WebhookServer {
    config: WebhookConfig,
    bus: Arc<EventBus>,
    state: ServerState,
    running: Option<Running>,
}

impl WebhookServer {
    pub fn new(config: WebhookConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            bus,
            state: ServerState::Stopped,
            running: None,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Bind and start serving in a background task.
    ///
    /// Fails with [`Error::AlreadyRunning`] if already listening, with
    /// [`Error::Config`] if the path does not start with `/` and with
    /// [`Error::Server`] if the socket cannot be bound.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.running.is_some() {
            return Err(Error::AlreadyRunning);
        }
        if !self.config.path.starts_with('/') {
            return Err(Error::Config(format!(
                "Webhook path must start with '/': {}",
                self.config.path
            )));
        }
        self.state = ServerState::Starting;

        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                self.state = ServerState::Stopped;
                return Err(e);
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.state = ServerState::Stopped;
                return Err(Error::Server(format!("Failed to read bound address: {}", e)));
            }
        };

        let app = router(self.bus.clone(), &self.config.path);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                })
                .await
        });

        self.running = Some(Running {
            local_addr,
            shutdown_tx,
            task,
        });
        self.state = ServerState::Listening;
        info!("Listening on http://{}{}", local_addr, self.config.path);
        Ok(local_addr)
    }

    async fn bind(&self) -> Result<TcpListener> {
        let host = self.config.host.as_str();
        let port = self.config.port;
        TcpListener::bind((host, port))
            .await
            .map_err(|e| Error::Server(format!("Failed to bind {}:{}: {}", host, port, e)))
    }

    /// Stop accepting connections and wait (bounded) for in-flight requests.
    /// Safe to call when not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            self.state = ServerState::Stopped;
            return;
        };

        let _ = running.shutdown_tx.send(true);
        let mut task = running.task;
        match tokio::time::timeout(self.config.shutdown_timeout(), &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!("Webhook server exited with error: {}", e),
            Ok(Err(e)) => error!("Webhook server task failed: {}", e),
            Err(_) => {
                warn!("In-flight requests did not finish in time, aborting");
                task.abort();
            }
        }

        self.state = ServerState::Stopped;
        info!("Webhook server stopped");
    }
}

impl Drop for WebhookServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}

/// Router accepting events on `path` only.
///
/// Anything other than `POST` to `path` is a 404, other methods included.
/// `path` must start with `/`.
pub fn router(bus: Arc<EventBus>, path: &str) -> Router {
    Router::new()
        .route(path, post(receive_event).fallback(not_found))
        .fallback(not_found)
        .with_state(bus)
}

async fn receive_event(State(bus): State<Arc<EventBus>>, body: Bytes) -> (StatusCode, String) {
    let envelope = match Envelope::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("Rejected webhook payload: {}", e);
            return (StatusCode::BAD_REQUEST, format!("Bad payload: {}", e));
        }
    };

    debug!("Dispatching event: {}", envelope.event);
    // Callbacks are synchronous and may block
    let dispatched = tokio::task::spawn_blocking(move || bus.emit(&envelope.event, &envelope.data)).await;
    if let Err(e) = dispatched {
        error!("Event dispatch task failed: {}", e);
    }

    (StatusCode::OK, "OK".to_string())
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
