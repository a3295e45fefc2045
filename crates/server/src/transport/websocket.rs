use crate::config::ServerConfig;
use rosbridge_client::registry::Identifier;
use rosbridge_client::transport::websocket::{drive_session, WebSocketHandle};
use rosbridge_client::{Ros, SessionHandle};
use rosbridge_protocol::SessionId;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;

/// Chooses the identifier an accepted connection is registered under
///
/// Returning `None` leaves the session unregistered: its inbound frames are
/// still routed, but nothing can be sent to it by identifier.
pub trait ConnectionBootstrap<I>: Send + Sync + 'static {
    fn bootstrap(&self, peer: SocketAddr, session: SessionId) -> Option<I>;
}

impl<I, F> ConnectionBootstrap<I> for F
where
    F: Fn(SocketAddr, SessionId) -> Option<I> + Send + Sync + 'static,
{
    fn bootstrap(&self, peer: SocketAddr, session: SessionId) -> Option<I> {
        self(peer, session)
    }
}

/// WebSocket server that accepts rosbridge peers into a shared [`Ros`]
pub struct WebSocketServer<I> {
    config: ServerConfig,
    bootstrap: Arc<dyn ConnectionBootstrap<I>>,
    active: Arc<AtomicUsize>,
}

impl<I: Identifier> WebSocketServer<I> {
    pub fn new(config: ServerConfig, bootstrap: impl ConnectionBootstrap<I>) -> Self {
        Self {
            config,
            bootstrap: Arc::new(bootstrap),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Binds `host:port` from the config and serves until the listener fails
    pub async fn run(self, ros: Arc<Ros<I>>) -> Result<(), WebSocketServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| WebSocketServerError::BindError(format!("{addr}: {e}")))?;

        self.serve(listener, ros).await
    }

    /// Serves connections from an already bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
        ros: Arc<Ros<I>>,
    ) -> Result<(), WebSocketServerError> {
        let local = listener
            .local_addr()
            .map_err(|e| WebSocketServerError::BindError(e.to_string()))?;
        tracing::info!(addr = %local, "WebSocket server listening");

        let mut failures = 0u32;
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => {
                    failures = 0;
                    accepted
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = accept_backoff(failures);
                    tracing::warn!(error = %e, retry_in = ?delay, "Failed to accept connection");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            if self.active.load(Ordering::Acquire) >= self.config.max_connections {
                tracing::warn!(
                    %peer,
                    limit = self.config.max_connections,
                    "Refusing connection over limit"
                );
                drop(stream);
                continue;
            }

            let guard = ActiveGuard::new(Arc::clone(&self.active));
            let ros = Arc::clone(&ros);
            let bootstrap = Arc::clone(&self.bootstrap);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, ros, bootstrap).await {
                    tracing::warn!(%peer, error = %e, "Connection failed");
                }
                drop(guard);
            });
        }
    }
}

/// Delay before retrying after `failures` consecutive accept errors
///
/// Doubles from 10ms up to 1s, so a persistent error such as running out of
/// file descriptors does not spin the accept loop.
fn accept_backoff(failures: u32) -> Duration {
    const BASE: Duration = Duration::from_millis(10);
    const MAX: Duration = Duration::from_secs(1);
    let exponent = failures.saturating_sub(1).min(7);
    (BASE * 2u32.pow(exponent)).min(MAX)
}

/// Performs the handshake, bootstraps the session and pumps it to completion
async fn handle_connection<I: Identifier>(
    stream: TcpStream,
    peer: SocketAddr,
    ros: Arc<Ros<I>>,
    bootstrap: Arc<dyn ConnectionBootstrap<I>>,
) -> Result<(), WebSocketServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| WebSocketServerError::WebSocketError(e.to_string()))?;

    let (handle, outgoing_rx) = WebSocketHandle::pair();
    let session = handle.session_id();
    tracing::info!(%peer, %session, "WebSocket handshake completed");

    match bootstrap.bootstrap(peer, session) {
        Some(identifier) => {
            let dyn_handle: Arc<dyn SessionHandle> = handle.clone();
            ros.on_connected(&dyn_handle, identifier);
        }
        None => tracing::info!(%peer, %session, "Connection left unregistered"),
    }

    drive_session(ws_stream, ros, handle, outgoing_rx).await;
    Ok(())
}

struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self(active)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// WebSocket server errors
#[derive(Debug, thiserror::Error)]
pub enum WebSocketServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),
}
