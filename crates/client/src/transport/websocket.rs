//! WebSocket transport
//!
//! [`drive_session`] pumps one WebSocket connection: inbound text and binary
//! frames go to [`Ros::on_frame`], frames queued on the [`WebSocketHandle`]
//! go out as text. [`WebSocketClient`] dials a rosbridge server and runs the
//! pump; the server crate reuses the same pump for accepted connections.

use super::{SessionHandle, TransportError};
use crate::registry::Identifier;
use crate::ros::Ros;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rosbridge_protocol::SessionId;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, WebSocketStream};

/// Outbound side of a WebSocket session
#[derive(Debug)]
pub struct WebSocketHandle {
    session_id: SessionId,
    outgoing: mpsc::UnboundedSender<Message>,
}

impl WebSocketHandle {
    /// Creates a handle and the queue [`drive_session`] drains
    pub fn pair() -> (Arc<Self>, mpsc::UnboundedReceiver<Message>) {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let handle = Arc::new(Self {
            session_id: SessionId::new_v4(),
            outgoing,
        });
        (handle, outgoing_rx)
    }
}

impl SessionHandle for WebSocketHandle {
    fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn send_bytes(&self, frame: Bytes) -> Result<(), TransportError> {
        let text = String::from_utf8(frame.to_vec())
            .map_err(|e| TransportError::Io(format!("frame is not UTF-8: {e}")))?;
        self.outgoing
            .send(Message::text(text))
            .map_err(|_| TransportError::Closed)
    }
}

/// Runs one connection until either side closes it
///
/// The session must already be registered with `ros` if it should be
/// addressable; this function only reports the disconnect.
pub async fn drive_session<S, I>(
    ws_stream: WebSocketStream<S>,
    ros: Arc<Ros<I>>,
    handle: Arc<WebSocketHandle>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Message>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    I: Identifier,
{
    let session = handle.session_id();
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        ros.on_frame(text.as_bytes(), session);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        ros.on_frame(&data, session);
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(%session, "Peer closed connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        // ping/pong are answered by tungstenite
                    }
                    Some(Err(e)) => {
                        ros.on_transport_error(session, &TransportError::WebSocket(e.to_string()));
                        break;
                    }
                    None => {
                        tracing::info!(%session, "Connection closed");
                        break;
                    }
                }
            }

            Some(message) = outgoing_rx.recv() => {
                if let Err(e) = ws_sender.send(message).await {
                    ros.on_transport_error(session, &TransportError::WebSocket(e.to_string()));
                    break;
                }
            }
        }
    }

    drop(handle);
    ros.on_disconnected(session);
}

/// Dials a rosbridge server and registers the connection with a [`Ros`]
pub struct WebSocketClient {
    url: String,
}

impl WebSocketClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connects, registers the session under `identifier` and spawns the pump
    ///
    /// Returns once the session is addressable; the join handle completes
    /// when the connection closes.
    pub async fn connect<I: Identifier>(
        &self,
        ros: Arc<Ros<I>>,
        identifier: I,
    ) -> Result<JoinHandle<()>, WebSocketClientError> {
        tracing::info!(url = %self.url, "Connecting to rosbridge server");

        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| WebSocketClientError::ConnectionError(e.to_string()))?;

        tracing::info!(url = %self.url, "WebSocket connection established");

        let (handle, outgoing_rx) = WebSocketHandle::pair();
        let session: Arc<dyn SessionHandle> = handle.clone();
        ros.on_connected(&session, identifier);

        Ok(tokio::spawn(drive_session(ws_stream, ros, handle, outgoing_rx)))
    }

    /// Connects and runs the session to completion
    pub async fn run<I: Identifier>(
        self,
        ros: Arc<Ros<I>>,
        identifier: I,
    ) -> Result<(), WebSocketClientError> {
        let pump = self.connect(ros, identifier).await?;
        pump.await
            .map_err(|e| WebSocketClientError::TaskError(e.to_string()))
    }
}

/// WebSocket client errors
#[derive(Debug, thiserror::Error)]
pub enum WebSocketClientError {
    #[error("Failed to connect: {0}")]
    ConnectionError(String),

    #[error("Session task failed: {0}")]
    TaskError(String),
}
