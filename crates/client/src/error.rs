use crate::transport::TransportError;
use rosbridge_protocol::ProtocolError;

/// Errors returned by [`Ros`](crate::Ros) operations
#[derive(Debug, thiserror::Error)]
pub enum RosError {
    /// No live session is registered under the identifier
    #[error("No session registered for {0}")]
    NotConnected(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] ProtocolError),

    /// The configured call timeout elapsed before a `service_response` arrived
    #[error("Service call {call_id} timed out")]
    Timeout { call_id: String },

    /// The pending call was cancelled or dropped without a response
    #[error("Service call {call_id} ended without a response")]
    NoResponse { call_id: String },
}

pub type Result<T> = std::result::Result<T, RosError>;
