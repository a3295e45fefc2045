//! Transport seam between live connections and the [`Ros`](crate::Ros) facade
//!
//! A transport owns the socket and its read loop. It hands the facade a
//! [`SessionHandle`] for outbound frames and feeds inbound frames back
//! through [`Ros::on_frame`](crate::Ros::on_frame).

pub mod memory;
pub mod websocket;

use bytes::Bytes;
use rosbridge_protocol::SessionId;

/// Outbound side of one live connection
///
/// Implementations must be cheap to call from any thread; `send_bytes`
/// enqueues the frame and never waits for the peer.
pub trait SessionHandle: Send + Sync + 'static {
    /// Unique id of this connection
    fn session_id(&self) -> SessionId;

    /// Queues one encoded frame for delivery
    fn send_bytes(&self, frame: Bytes) -> Result<(), TransportError>;
}

/// Transport errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Session closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),
}
